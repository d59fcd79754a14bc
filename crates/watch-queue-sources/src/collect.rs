use tracing::{debug, warn};
use watch_queue_models::{QueueItem, StreamingService};
use crate::error::Result;
use crate::traits::SiteAdapter;

/// Candidates an adapter offers for its page, ready for a batch add.
///
/// A series page yields all its episodes; any other page yields its single
/// item, if it has one. Candidates without a title or URL are dropped and
/// unattributed ones are attributed to the adapter's service. Nothing here
/// deduplicates; that is the engine's job.
pub async fn collect_candidates(adapter: &dyn SiteAdapter) -> Result<Vec<QueueItem>> {
    let raw = if adapter.is_series_page().await? {
        let series = adapter.get_series_data().await?;
        debug!(
            "Series page '{}' lists {} episode(s)",
            series.title,
            series.episodes.len()
        );
        series.episodes
    } else {
        adapter.extract_single_item().await?.into_iter().collect()
    };

    let offered = raw.len();
    let candidates: Vec<QueueItem> = raw
        .into_iter()
        .filter(|item| !item.title.trim().is_empty() && !item.url.trim().is_empty())
        .map(|mut item| {
            if item.service == StreamingService::Other {
                item.service = adapter.service();
            }
            item
        })
        .collect();

    if candidates.len() < offered {
        warn!(
            "Dropped {} incomplete candidate(s) from {}",
            offered - candidates.len(),
            adapter.page_url()
        );
    }
    Ok(candidates)
}
