//! The owning context: sole writer of the persisted queue.
//!
//! `QueueOwner` runs as one tokio task and handles requests one at a time, so
//! no two read-modify-write cycles on the store can interleave. Other
//! contexts only hold an [`OwnerHandle`] (or a transport leading to one) and
//! request mutations; they learn the outcome from the reply and the
//! broadcast that follows every successful write.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use watch_queue_config::{default_watch_markers, SyncOptions};
use watch_queue_models::{QueueItem, QueueState};
use crate::broadcast::{BroadcastReport, ListenerRegistry, Subscription};
use crate::completion::{next_after_completion, Navigator};
use crate::engine::QueueEngine;
use crate::error::{QueueError, Result};
use crate::protocol::{Message, QueueChange, Response};
use crate::store::QueueStore;

/// Channel and timing knobs of the owner
#[derive(Debug, Clone)]
pub struct OwnerSettings {
    pub channel_capacity: usize,
    pub delivery_timeout: Duration,
    pub watch_markers: Vec<String>,
}

impl Default for OwnerSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            delivery_timeout: Duration::from_millis(500),
            watch_markers: default_watch_markers(),
        }
    }
}

impl From<&SyncOptions> for OwnerSettings {
    fn from(options: &SyncOptions) -> Self {
        Self {
            channel_capacity: options.channel_capacity,
            delivery_timeout: options.delivery_timeout(),
            watch_markers: options.watch_markers.clone(),
        }
    }
}

/// What a handled request produced
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub state: QueueState,
    /// Item opened after a `VIDEO_COMPLETED`
    pub next: Option<QueueItem>,
}

enum Command {
    Request {
        message: Message,
        reply: oneshot::Sender<Result<Outcome>>,
    },
    Shutdown,
}

pub struct QueueOwner {
    engine: QueueEngine,
    listeners: ListenerRegistry,
    navigator: Option<Arc<dyn Navigator>>,
    commands: mpsc::Receiver<Command>,
}

/// Cloneable entry point to a running owner
#[derive(Clone)]
pub struct OwnerHandle {
    commands: mpsc::Sender<Command>,
    listeners: ListenerRegistry,
    inbox_capacity: usize,
}

impl QueueOwner {
    /// Start the owner task over `store`
    pub fn spawn(
        store: Arc<dyn QueueStore>,
        settings: OwnerSettings,
        navigator: Option<Arc<dyn Navigator>>,
    ) -> (OwnerHandle, JoinHandle<()>) {
        let capacity = settings.channel_capacity.max(1);
        let (sender, commands) = mpsc::channel(capacity);
        let listeners = ListenerRegistry::new(settings.delivery_timeout);
        let engine = QueueEngine::new(store).with_watch_markers(settings.watch_markers);

        let owner = QueueOwner {
            engine,
            listeners: listeners.clone(),
            navigator,
            commands,
        };
        let task = tokio::spawn(owner.run());

        let handle = OwnerHandle {
            commands: sender,
            listeners,
            inbox_capacity: capacity,
        };
        (handle, task)
    }

    async fn run(mut self) {
        info!(operation = "owner_started", store = self.engine.store().name(), "Queue owner started");
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Request { message, reply } => {
                    let kind = message.kind();
                    let result = self.handle(message).await;
                    if let Err(e) = &result {
                        warn!(operation = "owner_request_failed", request = kind, error = %e, "Queue request failed");
                    }
                    if reply.send(result).is_err() {
                        debug!("Requester for {} went away before the reply", kind);
                    }
                }
                Command::Shutdown => break,
            }
        }
        self.listeners.clear();
        info!(operation = "owner_stopped", "Queue owner stopped");
    }

    async fn handle(&self, message: Message) -> Result<Outcome> {
        let kind = message.kind();
        debug!("Handling {}", kind);
        match message {
            Message::AddToQueue { item } => {
                let outcome = self.engine.add(item).await?;
                let id = outcome.ids.into_iter().next().unwrap_or_default();
                self.publish(QueueChange::ItemAdded { id }, &outcome.state).await;
                Ok(Outcome::from_state(outcome.state))
            }
            Message::AddBatchToQueue { items } => {
                let outcome = self.engine.add_batch(items).await?;
                self.publish(QueueChange::ItemsAdded { ids: outcome.ids }, &outcome.state).await;
                Ok(Outcome::from_state(outcome.state))
            }
            Message::RemoveFromQueue { id } => {
                let state = self.engine.remove(&id).await?;
                self.publish(QueueChange::ItemRemoved { id }, &state).await;
                Ok(Outcome::from_state(state))
            }
            Message::ReorderQueue { items } => {
                let state = self.engine.reorder(items).await?;
                self.publish(QueueChange::Reordered, &state).await;
                Ok(Outcome::from_state(state))
            }
            Message::ClearQueue => {
                let state = self.engine.clear().await?;
                self.publish(QueueChange::QueueCleared, &state).await;
                Ok(Outcome::from_state(state))
            }
            Message::RequestQueueState => Ok(Outcome::from_state(self.engine.state().await?)),
            Message::VideoCompleted { url } => {
                let state = self.engine.state().await?;
                let next = next_after_completion(&state, &url);
                match (&next, &self.navigator) {
                    (Some(item), Some(navigator)) => {
                        info!(operation = "video_completed", completed = %url, next = %item.url, "Opening next queue item");
                        if let Err(e) = navigator.open(item).await {
                            warn!("Failed to open next item {}: {}", item.url, e);
                        }
                    }
                    (Some(item), None) => debug!("No navigator attached, next item would be {}", item.url),
                    (None, _) => debug!("Nothing queued after {}", url),
                }
                Ok(Outcome { state, next })
            }
            Message::QueueStateUpdate { .. } | Message::QueueUpdated { .. } => Err(QueueError::Rejected(
                format!("{} is a notification, not a request", kind),
            )),
        }
    }

    /// Hint first, then the full state; failures stay inside the registry
    async fn publish(&self, change: QueueChange, state: &QueueState) -> BroadcastReport {
        let report = self
            .listeners
            .broadcast(&[
                Message::QueueUpdated { change },
                Message::QueueStateUpdate { state: state.clone() },
            ])
            .await;
        debug!(
            delivered = report.delivered,
            stalled = report.stalled,
            pruned = report.pruned,
            "Queue state broadcast"
        );
        report
    }
}

impl Outcome {
    fn from_state(state: QueueState) -> Self {
        Self { state, next: None }
    }
}

impl OwnerHandle {
    /// Run `message` on the owner and wait for its typed result
    pub async fn execute(&self, message: Message) -> Result<Outcome> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::Request { message, reply })
            .await
            .map_err(|_| QueueError::OwnerUnavailable)?;
        answer.await.map_err(|_| QueueError::OwnerUnavailable)?
    }

    /// Register a listener context; drop the subscription on teardown
    pub fn subscribe(&self, label: impl Into<String>) -> Subscription {
        self.listeners.subscribe(label, self.inbox_capacity)
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Stop the owner after the requests already queued
    pub async fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).await.is_err() {
            debug!("Queue owner already stopped");
        }
    }
}

/// Wire-level access to a queue owner, however far away it is
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: Message) -> Result<Response>;
}

#[async_trait]
impl Transport for OwnerHandle {
    async fn send(&self, message: Message) -> Result<Response> {
        match self.execute(message).await {
            Ok(outcome) => Ok(Response {
                success: true,
                error: None,
                state: Some(outcome.state),
                item: outcome.next,
            }),
            Err(QueueError::OwnerUnavailable) => Err(QueueError::OwnerUnavailable),
            Err(e) => Ok(Response::from(&e)),
        }
    }
}
