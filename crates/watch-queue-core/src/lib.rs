pub mod error;
pub mod store;
pub mod engine;
pub mod protocol;
pub mod broadcast;
pub mod owner;
pub mod mirror;
pub mod backend;
pub mod relay;
pub mod completion;

pub use error::{QueueError, Result};
pub use store::{open_store, FileStore, MemoryStore, QueueStore};
pub use engine::{is_watch_url, merge_item, AddOutcome, QueueEngine};
pub use protocol::{Message, QueueChange, Response};
pub use broadcast::{
    BroadcastReport, ChannelListener, DeliveryFailure, Listener, ListenerId, ListenerRegistration,
    ListenerRegistry, Subscription,
};
pub use owner::{Outcome, OwnerHandle, OwnerSettings, QueueOwner, Transport};
pub use mirror::QueueMirror;
pub use backend::{start_backend, ContextCapabilities, ContextRole, LocalOwner, QueueBackend, RemoteRequester};
pub use relay::{PagePort, PageRelay};
pub use completion::{next_after_completion, Navigator};
