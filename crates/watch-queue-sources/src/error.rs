use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No site adapter for {0}")]
    UnsupportedPage(String),

    #[error("Invalid page URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{service} page could not be read: {reason}")]
    Extraction { service: String, reason: String },

    #[error("Invalid page snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;
