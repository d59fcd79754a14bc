use async_trait::async_trait;
use tracing::info;
use watch_queue_core::{Navigator, Result};
use watch_queue_models::QueueItem;

/// Navigator for a terminal session: there is no tab to open, so the next
/// item is logged and reported by the `complete` command
pub struct LogNavigator;

#[async_trait]
impl Navigator for LogNavigator {
    async fn open(&self, item: &QueueItem) -> Result<()> {
        info!(operation = "open_next", id = %item.id, url = %item.url, "Next queue item: {}", item.title);
        Ok(())
    }
}
