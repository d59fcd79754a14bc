//! Best-effort fan-out of queue notifications to live listener contexts.
//!
//! Listeners come and go with tabs and pages. A listener whose channel is
//! closed is pruned the first time a delivery to it fails; a stalled one is
//! skipped for that broadcast and kept. Neither case is reported to the
//! context that performed the mutation.

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use crate::error::QueueError;
use crate::protocol::Message;

pub type ListenerId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The receiving context is gone (tab closed, page unloaded)
    Gone,
    /// The receiver did not accept the message in time
    Stalled(String),
}

/// One reachable context
#[async_trait]
pub trait Listener: Send + Sync {
    fn label(&self) -> &str;

    async fn deliver(&self, message: &Message) -> Result<(), DeliveryFailure>;
}

/// Listener backed by a tokio channel, the in-process stand-in for a port
pub struct ChannelListener {
    label: String,
    sender: mpsc::Sender<Message>,
}

impl ChannelListener {
    pub fn new(label: impl Into<String>, sender: mpsc::Sender<Message>) -> Self {
        Self {
            label: label.into(),
            sender,
        }
    }
}

#[async_trait]
impl Listener for ChannelListener {
    fn label(&self) -> &str {
        &self.label
    }

    async fn deliver(&self, message: &Message) -> Result<(), DeliveryFailure> {
        self.sender
            .send(message.clone())
            .await
            .map_err(|_| DeliveryFailure::Gone)
    }
}

type ListenerMap = Mutex<HashMap<ListenerId, Arc<dyn Listener>>>;

/// Registry of listeners the owning context can reach
#[derive(Clone)]
pub struct ListenerRegistry {
    listeners: Arc<ListenerMap>,
    next_id: Arc<AtomicU64>,
    delivery_timeout: Duration,
}

/// Keeps a listener registered; dropping it deregisters the listener
pub struct ListenerRegistration {
    id: ListenerId,
    registry: Weak<ListenerMap>,
}

/// A registered channel listener together with its inbox
pub struct Subscription {
    pub registration: ListenerRegistration,
    pub inbox: mpsc::Receiver<Message>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub stalled: usize,
    pub pruned: usize,
}

impl ListenerRegistry {
    pub fn new(delivery_timeout: Duration) -> Self {
        Self {
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            delivery_timeout,
        }
    }

    pub fn register(&self, listener: Arc<dyn Listener>) -> ListenerRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Listener {} registered ({})", id, listener.label());
        self.listeners.lock().insert(id, listener);
        ListenerRegistration {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    /// Register a channel listener and hand back its receiving end
    pub fn subscribe(&self, label: impl Into<String>, capacity: usize) -> Subscription {
        let (sender, inbox) = mpsc::channel(capacity.max(1));
        let registration = self.register(Arc::new(ChannelListener::new(label, sender)));
        Subscription { registration, inbox }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener, e.g. when the owner shuts down
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    /// Send `messages`, in order, to every listener concurrently
    pub async fn broadcast(&self, messages: &[Message]) -> BroadcastReport {
        let snapshot: Vec<(ListenerId, Arc<dyn Listener>)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, listener)| (*id, listener.clone()))
            .collect();

        let deliveries = snapshot.into_iter().map(|(id, listener)| async move {
            let outcome = self.deliver_all(listener.as_ref(), messages).await;
            (id, listener, outcome)
        });
        let outcomes = join_all(deliveries).await;

        let mut report = BroadcastReport::default();
        let mut gone = Vec::new();
        for (id, listener, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    let error = QueueError::Delivery {
                        listener: id,
                        reason: format!("{} ({:?})", listener.label(), failure),
                    };
                    warn!("{}", error);
                    match failure {
                        DeliveryFailure::Gone => gone.push(id),
                        DeliveryFailure::Stalled(_) => report.stalled += 1,
                    }
                }
            }
        }

        if !gone.is_empty() {
            let mut listeners = self.listeners.lock();
            for id in &gone {
                listeners.remove(id);
            }
            report.pruned = gone.len();
            debug!("Pruned {} dead listener(s)", gone.len());
        }
        report
    }

    async fn deliver_all(&self, listener: &dyn Listener, messages: &[Message]) -> Result<(), DeliveryFailure> {
        for message in messages {
            match tokio::time::timeout(self.delivery_timeout, listener.deliver(message)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(DeliveryFailure::Stalled(format!(
                        "{} not accepted within {:?}",
                        message.kind(),
                        self.delivery_timeout
                    )))
                }
            }
        }
        Ok(())
    }
}

impl ListenerRegistration {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        if let Some(listeners) = self.registry.upgrade() {
            if listeners.lock().remove(&self.id).is_some() {
                debug!("Listener {} deregistered", self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::QueueChange;
    use watch_queue_models::QueueState;

    fn cleared() -> Vec<Message> {
        vec![
            Message::QueueUpdated { change: QueueChange::QueueCleared },
            Message::QueueStateUpdate { state: QueueState::empty(7) },
        ]
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_listener_in_order() {
        let registry = ListenerRegistry::new(Duration::from_millis(100));
        let mut first = registry.subscribe("popup", 4);
        let mut second = registry.subscribe("web-app", 4);

        let report = registry.broadcast(&cleared()).await;
        assert_eq!(report.delivered, 2);

        for sub in [&mut first, &mut second] {
            assert!(matches!(sub.inbox.recv().await, Some(Message::QueueUpdated { .. })));
            assert!(matches!(sub.inbox.recv().await, Some(Message::QueueStateUpdate { .. })));
        }
    }

    #[tokio::test]
    async fn test_closed_listener_is_pruned_without_blocking_others() {
        let registry = ListenerRegistry::new(Duration::from_millis(100));
        let closed = registry.subscribe("closed-tab", 4);
        let mut live = registry.subscribe("live-tab", 4);
        let Subscription { registration, inbox } = closed;
        drop(inbox);

        let report = registry.broadcast(&cleared()).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 1);
        assert_eq!(registry.len(), 1);
        assert!(live.inbox.recv().await.is_some());

        // deregistering an already pruned listener is a no-op
        drop(registration);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_stalled_listener_is_kept() {
        let registry = ListenerRegistry::new(Duration::from_millis(20));
        // capacity 1 and two messages: the second send cannot complete
        let _stalled = registry.subscribe("busy", 1);

        let report = registry.broadcast(&cleared()).await;
        assert_eq!(report.stalled, 1);
        assert_eq!(report.delivered, 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_dropping_registration_deregisters() {
        let registry = ListenerRegistry::new(Duration::from_millis(100));
        let sub = registry.subscribe("content-script", 4);
        assert_eq!(registry.len(), 1);
        drop(sub);
        assert!(registry.is_empty());
        assert_eq!(registry.broadcast(&cleared()).await, BroadcastReport::default());
    }
}
