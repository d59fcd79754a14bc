//! Bridge between a web page origin and the extension's messaging.
//!
//! The page cannot reach the extension store; a relay running next to it
//! forwards its requests upstream and pushes the owner's notifications down.
//! Messages posted from any other origin are dropped.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use crate::error::{QueueError, Result};
use crate::owner::Transport;
use crate::protocol::{Message, Response};

pub struct PageRelay {
    origin: String,
    upstream: Arc<dyn Transport>,
    page: mpsc::Sender<Message>,
}

impl PageRelay {
    pub fn new(origin: impl Into<String>, upstream: Arc<dyn Transport>, page: mpsc::Sender<Message>) -> Self {
        Self {
            origin: origin.into(),
            upstream,
            page,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Handle a message the page posted.
    ///
    /// Returns `None` when the message is not relayed: foreign origin, or a
    /// notification the page has no business sending. A state request is
    /// also answered with a `QUEUE_STATE_UPDATE` posted back to the page.
    pub async fn on_page_message(&self, origin: &str, message: Message) -> Option<Response> {
        if origin != self.origin {
            debug!("Dropping {} from foreign origin {}", message.kind(), origin);
            return None;
        }
        if message.is_notification() {
            debug!("Ignoring {} posted by the page", message.kind());
            return None;
        }

        let kind = message.kind();
        let is_state_request = matches!(message, Message::RequestQueueState);
        let response = match self.upstream.send(message).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Relaying {} failed: {}", kind, e);
                return Some(Response::from(&e));
            }
        };

        if is_state_request {
            if let Some(state) = &response.state {
                self.post(Message::QueueStateUpdate { state: state.clone() }).await;
            }
        }
        Some(response)
    }

    /// Pass an owner notification down to the page; other messages are not
    /// for the page and are dropped
    pub async fn on_extension_message(&self, message: Message) -> bool {
        if !message.is_notification() {
            return false;
        }
        self.post(message).await
    }

    /// Forward owner broadcasts to the page until either side goes away
    pub async fn run(&self, mut inbox: mpsc::Receiver<Message>) {
        while let Some(message) = inbox.recv().await {
            self.on_extension_message(message).await;
            if self.page.is_closed() {
                debug!("Page at {} closed, stopping relay", self.origin);
                break;
            }
        }
    }

    async fn post(&self, message: Message) -> bool {
        let kind = message.kind();
        match self.page.send(message).await {
            Ok(()) => true,
            Err(_) => {
                debug!("Page at {} gone, {} not posted", self.origin, kind);
                false
            }
        }
    }
}

/// The page's side of a relay, usable as a requester transport
pub struct PagePort {
    origin: String,
    relay: Arc<PageRelay>,
}

impl PagePort {
    pub fn new(origin: impl Into<String>, relay: Arc<PageRelay>) -> Self {
        Self {
            origin: origin.into(),
            relay,
        }
    }
}

#[async_trait]
impl Transport for PagePort {
    async fn send(&self, message: Message) -> Result<Response> {
        let kind = message.kind();
        self.relay
            .on_page_message(&self.origin, message)
            .await
            .ok_or_else(|| QueueError::Rejected(format!("{} was not relayed", kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::{OwnerSettings, QueueOwner};
    use crate::protocol::QueueChange;
    use crate::store::MemoryStore;
    use watch_queue_models::{QueueItem, QueueState, StreamingService};

    const ORIGIN: &str = "https://queue.example.app";

    fn relay() -> (Arc<PageRelay>, mpsc::Receiver<Message>, crate::owner::OwnerHandle) {
        let (owner, _task) = QueueOwner::spawn(Arc::new(MemoryStore::new("relay")), OwnerSettings::default(), None);
        let (page, page_inbox) = mpsc::channel(8);
        let relay = Arc::new(PageRelay::new(ORIGIN, Arc::new(owner.clone()), page));
        (relay, page_inbox, owner)
    }

    #[tokio::test]
    async fn test_foreign_origin_is_dropped() {
        let (relay, mut page, _owner) = relay();
        let response = relay.on_page_message("https://evil.example", Message::ClearQueue).await;
        assert!(response.is_none());
        assert!(page.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_state_request_is_posted_back() {
        let (relay, mut page, owner) = relay();
        owner
            .execute(Message::AddToQueue {
                item: QueueItem::movie("m", "Heat", "https://www.max.com/watch/1", StreamingService::Max),
            })
            .await
            .unwrap();

        let response = relay.on_page_message(ORIGIN, Message::RequestQueueState).await.unwrap();
        assert!(response.success);
        match page.recv().await {
            Some(Message::QueueStateUpdate { state }) => assert_eq!(state.items[0].id, "m"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_from_page_reports_outcome() {
        let (relay, _page, _owner) = relay();
        let response = relay.on_page_message(ORIGIN, Message::ClearQueue).await.unwrap();
        assert!(response.success);
        assert!(response.state.unwrap().is_empty());

        let response = relay
            .on_page_message(ORIGIN, Message::RemoveFromQueue { id: "nope".to_string() })
            .await
            .unwrap();
        assert!(!response.success);
    }

    #[tokio::test]
    async fn test_only_notifications_flow_down() {
        let (relay, mut page, _owner) = relay();
        assert!(!relay.on_extension_message(Message::ClearQueue).await);
        assert!(
            relay
                .on_extension_message(Message::QueueUpdated { change: QueueChange::Reordered })
                .await
        );
        assert!(matches!(page.recv().await, Some(Message::QueueUpdated { .. })));
    }

    #[tokio::test]
    async fn test_page_cannot_inject_notifications() {
        let (relay, _page, _owner) = relay();
        let forged = Message::QueueStateUpdate { state: QueueState::empty(1) };
        assert!(relay.on_page_message(ORIGIN, forged).await.is_none());

        let port = PagePort::new(ORIGIN, relay);
        let err = port
            .send(Message::QueueUpdated { change: QueueChange::QueueCleared })
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_run_forwards_owner_broadcasts() {
        let (relay, mut page, owner) = relay();
        let subscription = owner.subscribe("relay");
        let forwarding = relay.clone();
        let inbox = subscription.inbox;
        tokio::spawn(async move { forwarding.run(inbox).await });

        owner.execute(Message::ClearQueue).await.unwrap();
        assert!(matches!(page.recv().await, Some(Message::QueueUpdated { .. })));
        assert!(matches!(page.recv().await, Some(Message::QueueStateUpdate { .. })));
        drop(subscription.registration);
    }
}
