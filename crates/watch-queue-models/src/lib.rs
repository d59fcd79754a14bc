pub mod identity;
pub mod item;
pub mod service;
pub mod state;

pub use identity::{identity_key, IdentityKey};
pub use item::{EpisodeInfo, ItemKind, QueueItem};
pub use service::StreamingService;
pub use state::{now_millis, QueueState};
