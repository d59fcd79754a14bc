use thiserror::Error;

/// Failures of the queue core.
///
/// `RelayTimeout` and `Delivery` are produced internally and logged; they are
/// never returned from a mutation.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Queue item not found: {0}")]
    NotFound(String),

    #[error("Store I/O error: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No queue state received within {0:?}")]
    RelayTimeout(std::time::Duration),

    #[error("Delivery to listener {listener} failed: {reason}")]
    Delivery { listener: u64, reason: String },

    #[error("Invalid reorder: {0}")]
    InvalidReorder(String),

    #[error("Queue owner is not running")]
    OwnerUnavailable,

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl QueueError {
    /// Store I/O class errors (I/O or serialization), the ones a UI may retry
    pub fn is_store_io(&self) -> bool {
        matches!(self, QueueError::StoreIo(_) | QueueError::Serialization(_))
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
