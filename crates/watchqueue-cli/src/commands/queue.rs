use crate::navigator::LogNavigator;
use crate::output::Output;
use crate::AddCommands;
use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use watch_queue_config::{Config, PathManager};
use watch_queue_core::{start_backend, ContextCapabilities, Navigator, QueueBackend};
use watch_queue_models::{EpisodeInfo, QueueItem, StreamingService};
use watch_queue_sources::{collect_candidates, parse_duration, service_for_url, AdapterRegistry, PageSnapshot};

/// The CLI acts as the owning context for the configured store
pub struct QueueSession {
    backend: Box<dyn QueueBackend>,
}

impl QueueSession {
    pub fn open(config: &Config, paths: &PathManager) -> Result<Self> {
        let navigator: Arc<dyn Navigator> = Arc::new(LogNavigator);
        let backend = start_backend(ContextCapabilities::background(), config, paths, None, Some(navigator))
            .wrap_err("Failed to open the queue store")?;
        Ok(Self { backend })
    }

    fn backend(&self) -> &dyn QueueBackend {
        self.backend.as_ref()
    }
}

pub async fn run_list(session: &QueueSession, output: &Output) -> Result<()> {
    let state = session.backend().state().await?;
    output.queue(&state);
    Ok(())
}

pub async fn run_add(session: &QueueSession, kind: AddCommands, output: &Output) -> Result<()> {
    let item = build_item(kind)?;
    let title = item.title.clone();
    let state = session.backend().add(item).await?;
    output.state_changed(format!("Queued '{}' ({} in queue)", title, state.len()), &state);
    Ok(())
}

pub async fn run_import(session: &QueueSession, file: &Path, output: &Output) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    let items = parse_import(&text).await?;

    if items.is_empty() {
        output.warn(format!("Nothing to import from {}", file.display()));
        return Ok(());
    }

    let offered = items.len();
    let before = session.backend().state().await?.len();
    let state = session.backend().add_batch(items).await?;
    let appended = state.len().saturating_sub(before);
    output.state_changed(
        format!(
            "Imported {} item(s): {} new, {} merged into existing entries",
            offered,
            appended,
            offered - appended.min(offered)
        ),
        &state,
    );
    Ok(())
}

pub async fn run_remove(session: &QueueSession, id: &str, output: &Output) -> Result<()> {
    let state = session
        .backend()
        .remove(id)
        .await
        .wrap_err_with(|| format!("Could not remove {}", id))?;
    output.state_changed(format!("Removed {} ({} left)", id, state.len()), &state);
    Ok(())
}

pub async fn run_move(session: &QueueSession, id: &str, position: usize, output: &Output) -> Result<()> {
    let current = session.backend().state().await?;
    let items: Vec<QueueItem> = current.ordered().into_iter().cloned().collect();
    let reordered = move_item(items, id, position).ok_or_else(|| eyre!("Queue item not found: {}", id))?;

    let state = session.backend().reorder(reordered).await?;
    let placed = state.find(id).map(|item| item.order).unwrap_or(position);
    output.state_changed(format!("Moved {} to position {}", id, placed), &state);
    Ok(())
}

pub async fn run_clear(session: &QueueSession, output: &Output) -> Result<()> {
    let state = session.backend().clear().await?;
    output.state_changed("Queue cleared", &state);
    Ok(())
}

pub async fn run_complete(session: &QueueSession, url: &str, output: &Output) -> Result<()> {
    match session.backend().mark_complete(url).await? {
        Some(next) => output.next_up(&next),
        None => output.info(format!("Nothing queued after {}", url)),
    }
    Ok(())
}

/// Items from an import file: a plain array of items, or a page snapshot
/// read through the adapter for its host
async fn parse_import(text: &str) -> Result<Vec<QueueItem>> {
    let value: serde_json::Value = serde_json::from_str(text).wrap_err("Import file is not valid JSON")?;
    if value.is_array() {
        let items: Vec<QueueItem> = serde_json::from_value(value).wrap_err("Invalid queue item list")?;
        return Ok(items);
    }

    let snapshot: PageSnapshot = serde_json::from_value(value).wrap_err("Invalid page snapshot")?;
    debug!("Importing page snapshot of {}", snapshot.url);
    let registry = AdapterRegistry::new();
    let adapter = registry.adapter_for(snapshot)?;
    Ok(collect_candidates(adapter.as_ref()).await?)
}

/// `items` in play order with `id` moved to `position` (clamped to the end)
fn move_item(mut items: Vec<QueueItem>, id: &str, position: usize) -> Option<Vec<QueueItem>> {
    let from = items.iter().position(|item| item.id == id)?;
    let item = items.remove(from);
    let to = position.min(items.len());
    items.insert(to, item);
    Some(items)
}

fn build_item(kind: AddCommands) -> Result<QueueItem> {
    let (mut item, common) = match kind {
        AddCommands::Movie { title, url, common } => {
            let service = resolve_service(common.service.as_deref(), &url)?;
            (QueueItem::movie(common.id.clone().unwrap_or_default(), title, url, service), common)
        }
        AddCommands::Episode {
            title,
            url,
            series,
            season,
            episode,
            series_id,
            common,
        } => {
            let service = resolve_service(common.service.as_deref(), &url)?;
            let info = EpisodeInfo::new(series_id.unwrap_or_default(), series, season, episode);
            (
                QueueItem::episode(common.id.clone().unwrap_or_default(), title, url, service, info),
                common,
            )
        }
    };

    if let Some(duration) = common.duration.as_deref() {
        item.duration = Some(parse_seconds(duration)?);
    }
    item.thumbnail_url = common.thumbnail;
    Ok(item)
}

fn resolve_service(explicit: Option<&str>, url: &str) -> Result<StreamingService> {
    match explicit {
        Some(name) => name.parse::<StreamingService>().map_err(|e| eyre!(e)),
        None => Ok(service_for_url(url)),
    }
}

fn parse_seconds(text: &str) -> Result<u32> {
    text.trim()
        .parse::<u32>()
        .ok()
        .or_else(|| parse_duration(text))
        .ok_or_else(|| eyre!("Invalid duration '{}': use seconds, m:ss or h:mm:ss", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ItemArgs;

    fn items(ids: &[&str]) -> Vec<QueueItem> {
        ids.iter()
            .map(|id| QueueItem::movie(*id, *id, "/watch/x", StreamingService::Other))
            .collect()
    }

    fn ids(items: &[QueueItem]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn test_move_item() {
        let moved = move_item(items(&["a", "b", "c"]), "c", 0).unwrap();
        assert_eq!(ids(&moved), vec!["c", "a", "b"]);

        let moved = move_item(items(&["a", "b", "c"]), "a", 99).unwrap();
        assert_eq!(ids(&moved), vec!["b", "c", "a"]);

        assert!(move_item(items(&["a"]), "zzz", 0).is_none());
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("1200").unwrap(), 1200);
        assert_eq!(parse_seconds("20:00").unwrap(), 1200);
        assert!(parse_seconds("twenty minutes").is_err());
        assert!(parse_seconds("99999999:00").is_err());
    }

    #[test]
    fn test_build_episode_detects_service() {
        let item = build_item(AddCommands::Episode {
            title: "Pilot".to_string(),
            url: "https://www.netflix.com/watch/1".to_string(),
            series: "Foo".to_string(),
            season: 1,
            episode: 1,
            series_id: None,
            common: ItemArgs {
                id: None,
                service: None,
                duration: Some("42:00".to_string()),
                thumbnail: None,
            },
        })
        .unwrap();
        assert_eq!(item.service, StreamingService::Netflix);
        assert_eq!(item.duration, Some(2520));
        assert!(item.id.is_empty());
        assert_eq!(item.episode_info().unwrap().series_title, "Foo");
    }

    #[test]
    fn test_unknown_service_name_is_rejected() {
        assert!(resolve_service(Some("betamax"), "https://x").is_err());
        assert_eq!(resolve_service(Some("hulu"), "https://x").unwrap(), StreamingService::Hulu);
    }

    #[tokio::test]
    async fn test_parse_import_accepts_items_and_snapshots() {
        let items = parse_import(
            r#"[{"id": "m", "title": "Heat", "type": "movie", "url": "/watch/m"}]"#,
        )
        .await
        .unwrap();
        assert_eq!(items.len(), 1);

        let items = parse_import(
            r#"{"url": "https://www.hulu.com/movie/heat",
                "item": {"id": "h", "title": "Heat", "type": "movie", "url": "https://www.hulu.com/watch/h"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(items[0].service, StreamingService::Hulu);

        assert!(parse_import(r#"{"url": "https://example.com/x"}"#).await.is_err());
    }
}
