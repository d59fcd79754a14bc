//! Consumer-side cache of the queue.
//!
//! Every `QUEUE_STATE_UPDATE` broadcast is a full replacement of the cached
//! state: broadcasts arrive in owner order, so the last one wins even when its
//! `lastUpdated` went backwards (a reset store). States taken from request
//! replies travel outside that stream and are ignored when older than the
//! cached one. `QUEUE_UPDATED` just marks the cache stale until the next full
//! state arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::debug;
use watch_queue_models::QueueState;
use crate::protocol::Message;

pub struct QueueMirror {
    state: watch::Sender<Option<QueueState>>,
    stale: AtomicBool,
}

impl Default for QueueMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueMirror {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            stale: AtomicBool::new(false),
        }
    }

    /// Feed one message from the owner; returns true when the cache changed
    pub fn apply(&self, message: &Message) -> bool {
        match message {
            Message::QueueStateUpdate { state } => {
                self.install(state.clone());
                true
            }
            Message::QueueUpdated { change } => {
                debug!("Queue cache marked stale by {:?}", change);
                self.stale.store(true, Ordering::Release);
                false
            }
            _ => false,
        }
    }

    /// Install a state taken from a request reply, unless the cached one is
    /// newer
    pub fn replace(&self, state: QueueState) -> bool {
        let replaced = self.state.send_if_modified(|current| match current {
            Some(cached) if state.last_updated < cached.last_updated => {
                debug!(
                    "Ignoring queue state from {} older than cached {}",
                    state.last_updated, cached.last_updated
                );
                false
            }
            _ => {
                *current = Some(state);
                true
            }
        });
        if replaced {
            self.stale.store(false, Ordering::Release);
        }
        replaced
    }

    fn install(&self, state: QueueState) {
        self.state.send_replace(Some(state));
        self.stale.store(false, Ordering::Release);
    }

    pub fn current(&self) -> Option<QueueState> {
        self.state.borrow().clone()
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Watch for replacements of the cached state
    pub fn subscribe(&self) -> watch::Receiver<Option<QueueState>> {
        self.state.subscribe()
    }
}
