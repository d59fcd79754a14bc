use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use watch_queue_models::{QueueItem, StreamingService};
use crate::error::Result;

/// Everything a series page lists
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesData {
    pub title: String,
    #[serde(default)]
    pub episodes: Vec<QueueItem>,
}

/// Per-site extraction of queue candidates from the page it is attached to.
///
/// Adapters are untrusted producers: the same logical item may come back
/// with a different id or URL on every visit, and the reconciliation engine
/// is what deduplicates them.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn service(&self) -> StreamingService;

    /// URL of the page the adapter reads
    fn page_url(&self) -> &str;

    async fn is_series_page(&self) -> Result<bool>;

    async fn get_series_data(&self) -> Result<SeriesData>;

    async fn extract_single_item(&self) -> Result<Option<QueueItem>>;
}
