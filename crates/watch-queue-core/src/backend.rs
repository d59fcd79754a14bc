//! The queue as seen from one execution context.
//!
//! A context either owns the store ([`LocalOwner`]) or asks the owner for
//! everything ([`RemoteRequester`]). Which one it gets is decided once at
//! startup from [`ContextCapabilities`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use watch_queue_config::{Config, PathManager};
use watch_queue_models::{now_millis, QueueItem, QueueState};
use crate::broadcast::{ListenerRegistration, Subscription};
use crate::completion::Navigator;
use crate::error::{QueueError, Result};
use crate::mirror::QueueMirror;
use crate::owner::{OwnerHandle, OwnerSettings, QueueOwner, Transport};
use crate::protocol::{Message, Response};
use crate::store::{open_store, MemoryStore, QueueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    Owner,
    Requester,
}

/// What the current execution context can reach
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextCapabilities {
    /// Direct access to the extension-local store
    pub owns_extension_store: bool,
    /// A message channel towards the owning context
    pub messaging: bool,
    /// A page-local store usable as a read fallback
    pub page_store: bool,
}

impl ContextCapabilities {
    pub fn background() -> Self {
        Self {
            owns_extension_store: true,
            messaging: true,
            page_store: false,
        }
    }

    pub fn content_script() -> Self {
        Self {
            owns_extension_store: false,
            messaging: true,
            page_store: false,
        }
    }

    pub fn web_page() -> Self {
        Self {
            owns_extension_store: false,
            messaging: true,
            page_store: true,
        }
    }

    /// Fails with `StorageUnavailable` for a context that can neither store
    /// nor reach the owner
    pub fn role(&self) -> Result<ContextRole> {
        if self.owns_extension_store {
            Ok(ContextRole::Owner)
        } else if self.messaging {
            Ok(ContextRole::Requester)
        } else {
            Err(QueueError::StorageUnavailable(
                "context has neither queue storage nor a message channel".to_string(),
            ))
        }
    }
}

/// Queue operations available to a context, whatever its role
#[async_trait]
pub trait QueueBackend: Send + Sync {
    fn role(&self) -> ContextRole;

    async fn state(&self) -> Result<QueueState>;

    async fn add(&self, item: QueueItem) -> Result<QueueState>;

    async fn add_batch(&self, items: Vec<QueueItem>) -> Result<QueueState>;

    async fn remove(&self, id: &str) -> Result<QueueState>;

    async fn reorder(&self, items: Vec<QueueItem>) -> Result<QueueState>;

    async fn clear(&self) -> Result<QueueState>;

    /// Report a finished video; returns the item opened next, if any
    async fn mark_complete(&self, url: &str) -> Result<Option<QueueItem>>;
}

/// Backend of the owning context, running the queue owner in-process
pub struct LocalOwner {
    handle: OwnerHandle,
    task: Option<JoinHandle<()>>,
}

impl LocalOwner {
    pub fn start(
        store: Arc<dyn QueueStore>,
        settings: OwnerSettings,
        navigator: Option<Arc<dyn Navigator>>,
    ) -> Self {
        let (handle, task) = QueueOwner::spawn(store, settings, navigator);
        Self {
            handle,
            task: Some(task),
        }
    }

    pub fn handle(&self) -> &OwnerHandle {
        &self.handle
    }

    /// Shut the owner down and wait for it to finish
    pub async fn stop(mut self) {
        self.handle.shutdown().await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Queue owner task ended abnormally: {}", e);
            }
        }
    }

    async fn run(&self, message: Message) -> Result<QueueState> {
        Ok(self.handle.execute(message).await?.state)
    }
}

#[async_trait]
impl QueueBackend for LocalOwner {
    fn role(&self) -> ContextRole {
        ContextRole::Owner
    }

    async fn state(&self) -> Result<QueueState> {
        self.run(Message::RequestQueueState).await
    }

    async fn add(&self, item: QueueItem) -> Result<QueueState> {
        self.run(Message::AddToQueue { item }).await
    }

    async fn add_batch(&self, items: Vec<QueueItem>) -> Result<QueueState> {
        self.run(Message::AddBatchToQueue { items }).await
    }

    async fn remove(&self, id: &str) -> Result<QueueState> {
        self.run(Message::RemoveFromQueue { id: id.to_string() }).await
    }

    async fn reorder(&self, items: Vec<QueueItem>) -> Result<QueueState> {
        self.run(Message::ReorderQueue { items }).await
    }

    async fn clear(&self) -> Result<QueueState> {
        self.run(Message::ClearQueue).await
    }

    async fn mark_complete(&self, url: &str) -> Result<Option<QueueItem>> {
        let outcome = self
            .handle
            .execute(Message::VideoCompleted { url: url.to_string() })
            .await?;
        Ok(outcome.next)
    }
}

/// Backend of a context that only requests: content scripts, popups, pages
pub struct RemoteRequester {
    transport: Arc<dyn Transport>,
    mirror: Arc<QueueMirror>,
    request_timeout: Duration,
    fallback: Option<Arc<dyn QueueStore>>,
    registration: Option<ListenerRegistration>,
    drain: Option<JoinHandle<()>>,
}

impl RemoteRequester {
    pub fn new(transport: Arc<dyn Transport>, request_timeout: Duration) -> Self {
        Self {
            transport,
            mirror: Arc::new(QueueMirror::new()),
            request_timeout,
            fallback: None,
            registration: None,
            drain: None,
        }
    }

    /// Local store read when the owner does not answer in time
    pub fn with_fallback(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.fallback = Some(store);
        self
    }

    /// Feed the owner's broadcasts into the cache.
    ///
    /// The subscription stays registered for as long as the requester lives.
    pub fn attach(self, subscription: Subscription) -> Self {
        let Subscription { registration, inbox } = subscription;
        let mut requester = self.listen(inbox);
        requester.registration = Some(registration);
        requester
    }

    /// Feed notifications arriving on `inbox` (e.g. from a page relay) into the cache
    pub fn listen(mut self, inbox: mpsc::Receiver<Message>) -> Self {
        if let Some(previous) = self.drain.replace(spawn_drain(inbox, self.mirror.clone())) {
            previous.abort();
        }
        self
    }

    pub fn mirror(&self) -> &Arc<QueueMirror> {
        &self.mirror
    }

    pub fn is_attached(&self) -> bool {
        self.registration.is_some()
    }

    /// State for a freshly initialized consumer.
    ///
    /// Uses the cache when present; otherwise asks the owner and waits at
    /// most the request timeout. Always resolves: on timeout or a failed
    /// request it falls back to the local store, or an empty state.
    pub async fn initial_state(&self) -> QueueState {
        if let Some(state) = self.mirror.current() {
            return state;
        }
        self.fetch_state().await
    }

    async fn fetch_state(&self) -> QueueState {
        match tokio::time::timeout(self.request_timeout, self.request_state()).await {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                warn!("Queue state request failed, using fallback: {}", e);
                self.fallback_state().await
            }
            Err(_) => {
                let error = QueueError::RelayTimeout(self.request_timeout);
                warn!("{}, using fallback", error);
                self.fallback_state().await
            }
        }
    }

    /// Ask for the state and wait until the reply or a broadcast fills the cache
    async fn request_state(&self) -> Result<QueueState> {
        let mut updates = self.mirror.subscribe();
        let response = self.send(Message::RequestQueueState).await?;
        if let Some(state) = response.state {
            self.mirror.replace(state);
        }

        loop {
            let current = (*updates.borrow_and_update()).clone();
            if let Some(state) = current {
                return Ok(state);
            }
            debug!("Waiting for a queue state broadcast");
            updates
                .changed()
                .await
                .map_err(|_| QueueError::OwnerUnavailable)?;
        }
    }

    async fn fallback_state(&self) -> QueueState {
        match &self.fallback {
            Some(store) => match store.read().await {
                Ok(state) => {
                    info!("Using {} store as fallback queue state", store.name());
                    state
                }
                Err(e) => {
                    warn!("Fallback store {} unreadable: {}", store.name(), e);
                    QueueState::empty(now_millis())
                }
            },
            None => QueueState::empty(now_millis()),
        }
    }

    async fn send(&self, message: Message) -> Result<Response> {
        self.transport.send(message).await?.into_result()
    }

    async fn mutate(&self, message: Message) -> Result<QueueState> {
        let response = self.send(message).await?;
        match response.state {
            Some(state) => {
                self.mirror.replace(state.clone());
                Ok(state)
            }
            None => Ok(self.fetch_state().await),
        }
    }
}

fn spawn_drain(mut inbox: mpsc::Receiver<Message>, mirror: Arc<QueueMirror>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            mirror.apply(&message);
        }
        debug!("Queue broadcast inbox closed");
    })
}

impl Drop for RemoteRequester {
    fn drop(&mut self) {
        if let Some(drain) = self.drain.take() {
            drain.abort();
        }
    }
}

#[async_trait]
impl QueueBackend for RemoteRequester {
    fn role(&self) -> ContextRole {
        ContextRole::Requester
    }

    async fn state(&self) -> Result<QueueState> {
        match self.mirror.current() {
            Some(state) if !self.mirror.is_stale() => Ok(state),
            _ => Ok(self.fetch_state().await),
        }
    }

    async fn add(&self, item: QueueItem) -> Result<QueueState> {
        self.mutate(Message::AddToQueue { item }).await
    }

    async fn add_batch(&self, items: Vec<QueueItem>) -> Result<QueueState> {
        self.mutate(Message::AddBatchToQueue { items }).await
    }

    async fn remove(&self, id: &str) -> Result<QueueState> {
        self.mutate(Message::RemoveFromQueue { id: id.to_string() }).await
    }

    async fn reorder(&self, items: Vec<QueueItem>) -> Result<QueueState> {
        self.mutate(Message::ReorderQueue { items }).await
    }

    async fn clear(&self) -> Result<QueueState> {
        self.mutate(Message::ClearQueue).await
    }

    async fn mark_complete(&self, url: &str) -> Result<Option<QueueItem>> {
        let response = self.send(Message::VideoCompleted { url: url.to_string() }).await?;
        Ok(response.item)
    }
}

/// Pick and build the backend for a context.
///
/// An owner opens the configured store and starts the queue owner; a
/// requester needs `transport` and gets a page-local fallback store when the
/// context has one.
pub fn start_backend(
    capabilities: ContextCapabilities,
    config: &Config,
    paths: &PathManager,
    transport: Option<Arc<dyn Transport>>,
    navigator: Option<Arc<dyn Navigator>>,
) -> Result<Box<dyn QueueBackend>> {
    match capabilities.role()? {
        ContextRole::Owner => {
            let store = open_store(config, paths)?;
            info!(operation = "backend_started", role = "owner", store = store.name(), "Queue backend ready");
            Ok(Box::new(LocalOwner::start(store, OwnerSettings::from(&config.sync), navigator)))
        }
        ContextRole::Requester => {
            let transport = transport.ok_or_else(|| {
                QueueError::StorageUnavailable("no transport to the queue owner".to_string())
            })?;
            let mut requester = RemoteRequester::new(transport, config.sync.request_state_timeout());
            if capabilities.page_store {
                requester = requester.with_fallback(Arc::new(MemoryStore::new(config.store.key.clone())));
            }
            info!(operation = "backend_started", role = "requester", "Queue backend ready");
            Ok(Box::new(requester))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::pending;
    use watch_queue_models::StreamingService;

    /// A transport whose other end never answers
    struct SilentTransport;

    #[async_trait]
    impl Transport for SilentTransport {
        async fn send(&self, _message: Message) -> Result<Response> {
            pending().await
        }
    }

    /// Accepts a request but answers without state, as a relay does
    struct AckOnlyTransport;

    #[async_trait]
    impl Transport for AckOnlyTransport {
        async fn send(&self, _message: Message) -> Result<Response> {
            Ok(Response::ok())
        }
    }

    fn movie(id: &str) -> QueueItem {
        QueueItem::movie(id, id, format!("https://www.netflix.com/watch/{}", id), StreamingService::Netflix)
    }

    #[test]
    fn test_role_from_capabilities() {
        assert_eq!(ContextCapabilities::background().role().unwrap(), ContextRole::Owner);
        assert_eq!(ContextCapabilities::content_script().role().unwrap(), ContextRole::Requester);
        assert_eq!(ContextCapabilities::web_page().role().unwrap(), ContextRole::Requester);
        assert!(matches!(
            ContextCapabilities::default().role(),
            Err(QueueError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_local_owner_operations() {
        let owner = LocalOwner::start(Arc::new(MemoryStore::new("k")), OwnerSettings::default(), None);
        owner.add(movie("a")).await.unwrap();
        let state = owner.add_batch(vec![movie("b"), movie("c")]).await.unwrap();
        assert_eq!(state.len(), 3);

        let state = owner.remove("b").await.unwrap();
        assert_eq!(state.ordered().iter().map(|i| i.order).collect::<Vec<_>>(), vec![0, 1]);

        let state = owner.clear().await.unwrap();
        assert!(state.is_empty());
        assert_eq!(owner.role(), ContextRole::Owner);
        owner.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_owner_falls_back_to_empty_state() {
        let requester = RemoteRequester::new(Arc::new(SilentTransport), Duration::from_millis(2000));
        let state = requester.initial_state().await;
        assert!(state.is_empty());
        assert!(requester.mirror().current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_owner_falls_back_to_page_store() {
        let page_store = MemoryStore::new("universal_queue_state");
        let mut cached = QueueState::empty(3);
        cached.items.push(movie("cached"));
        page_store.write(&cached).await.unwrap();

        let requester = RemoteRequester::new(Arc::new(SilentTransport), Duration::from_millis(2000))
            .with_fallback(Arc::new(page_store));
        let state = requester.initial_state().await;
        assert_eq!(state.items[0].id, "cached");
    }

    #[tokio::test]
    async fn test_requester_goes_through_owner() {
        let owner = LocalOwner::start(Arc::new(MemoryStore::new("k")), OwnerSettings::default(), None);
        let requester = RemoteRequester::new(Arc::new(owner.handle().clone()), Duration::from_millis(2000))
            .attach(owner.handle().subscribe("content-script"));
        assert!(requester.is_attached());

        let state = requester.add(movie("a")).await.unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(requester.initial_state().await, state);

        let err = requester.remove("ghost").await.unwrap_err();
        assert!(matches!(err, QueueError::Rejected(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_arriving_by_broadcast_resolves_wait() {
        let owner = LocalOwner::start(Arc::new(MemoryStore::new("k")), OwnerSettings::default(), None);
        let requester = RemoteRequester::new(Arc::new(AckOnlyTransport), Duration::from_millis(2000))
            .attach(owner.handle().subscribe("page"));

        let broadcaster = owner.handle().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            broadcaster.execute(Message::AddToQueue { item: movie("late") }).await.unwrap();
        });

        let state = requester.initial_state().await;
        assert_eq!(state.items[0].id, "late");
    }

    #[tokio::test]
    async fn test_dropping_requester_deregisters_listener() {
        let owner = LocalOwner::start(Arc::new(MemoryStore::new("k")), OwnerSettings::default(), None);
        let requester = RemoteRequester::new(Arc::new(owner.handle().clone()), Duration::from_millis(2000))
            .attach(owner.handle().subscribe("tab"));
        assert_eq!(owner.handle().listeners().len(), 1);
        drop(requester);
        assert!(owner.handle().listeners().is_empty());
    }
}
