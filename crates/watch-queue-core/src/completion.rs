use async_trait::async_trait;
use url::Url;
use watch_queue_models::{QueueItem, QueueState};
use crate::error::Result;

/// Opens a queue item for playback (a new tab in the browser)
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn open(&self, item: &QueueItem) -> Result<()>;
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.to_lowercase()))
}

/// Item to play after the video at `completed_url` finished.
///
/// The finished item is the first one, by `order`, on the same host as the
/// completed page; the answer is the item right after it. Items with
/// unparsable URLs never match.
pub fn next_after_completion(state: &QueueState, completed_url: &str) -> Option<QueueItem> {
    let host = host_of(completed_url)?;
    let ordered = state.ordered();
    let current = ordered
        .iter()
        .position(|item| host_of(&item.url).as_deref() == Some(host.as_str()))?;
    ordered.get(current + 1).map(|item| (*item).clone())
}
