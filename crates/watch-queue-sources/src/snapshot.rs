//! Adapters over a captured page.
//!
//! A [`PageSnapshot`] is what a site's scraper saw on one page, recorded as
//! JSON. The CLI imports snapshots; tests use them as fake pages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;
use watch_queue_models::{QueueItem, StreamingService};
use crate::error::{Result, SourceError};
use crate::traits::{SeriesData, SiteAdapter};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<SeriesData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<QueueItem>,
}

impl PageSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Lowercased host of the page URL
    pub fn host(&self) -> Result<String> {
        host_of(&self.url)
    }
}

fn host_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| SourceError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .host_str()
        .map(|host| host.to_lowercase())
        .ok_or_else(|| SourceError::InvalidUrl {
            url: url.to_string(),
            reason: "no host".to_string(),
        })
}

/// Service serving `url`; `Other` for unknown hosts and unparsable URLs
pub fn service_for_url(url: &str) -> StreamingService {
    host_of(url)
        .map(|host| StreamingService::from_host(&host))
        .unwrap_or_default()
}

pub struct SnapshotAdapter {
    service: StreamingService,
    snapshot: PageSnapshot,
}

impl SnapshotAdapter {
    pub fn new(service: StreamingService, snapshot: PageSnapshot) -> Self {
        Self { service, snapshot }
    }
}

#[async_trait]
impl SiteAdapter for SnapshotAdapter {
    fn service(&self) -> StreamingService {
        self.service
    }

    fn page_url(&self) -> &str {
        &self.snapshot.url
    }

    async fn is_series_page(&self) -> Result<bool> {
        Ok(self
            .snapshot
            .series
            .as_ref()
            .is_some_and(|series| !series.episodes.is_empty()))
    }

    async fn get_series_data(&self) -> Result<SeriesData> {
        self.snapshot.series.clone().ok_or_else(|| SourceError::Extraction {
            service: self.service.to_string(),
            reason: format!("{} is not a series page", self.snapshot.url),
        })
    }

    async fn extract_single_item(&self) -> Result<Option<QueueItem>> {
        Ok(self.snapshot.item.clone())
    }
}

/// Parse a player clock label (`m:ss` or `h:mm:ss`) into seconds.
///
/// Returns `None` for anything else, including labels too large for `u32`.
pub fn parse_duration(text: &str) -> Option<u32> {
    let parts = text
        .trim()
        .split(':')
        .map(|part| part.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => (0, *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return None,
    };
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_queue_models::EpisodeInfo;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("42:10"), Some(2530));
        assert_eq!(parse_duration("1:02:03"), Some(3723));
        assert_eq!(parse_duration(" 0:59 "), Some(59));
        assert_eq!(parse_duration("45"), None);
        assert_eq!(parse_duration("1h 20m"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
    }

    #[test]
    fn test_parse_duration_overflow_is_rejected() {
        assert_eq!(parse_duration("99999999:00"), None);
        assert_eq!(parse_duration("4294967295:00:00"), None);
        assert_eq!(parse_duration("1193046:28:15"), Some(u32::MAX));
        assert_eq!(parse_duration("1193046:28:16"), None);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = PageSnapshot::from_json(
            r#"{
                "url": "https://www.netflix.com/title/1",
                "series": {
                    "title": "Foo",
                    "episodes": [{
                        "id": "e1", "title": "Pilot", "type": "episode", "url": "/watch/1",
                        "seriesId": "foo", "seriesTitle": "Foo", "seasonNumber": 1,
                        "episodeNumber": 1, "seriesThumbnailUrl": ""
                    }]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(snapshot.host().unwrap(), "www.netflix.com");
        let series = snapshot.series.unwrap();
        assert_eq!(
            series.episodes[0].episode_info(),
            Some(&EpisodeInfo::new("foo", "Foo", 1, 1))
        );
    }

    #[test]
    fn test_snapshot_without_host() {
        let snapshot = PageSnapshot {
            url: "not a url".to_string(),
            ..PageSnapshot::default()
        };
        assert!(matches!(snapshot.host(), Err(SourceError::InvalidUrl { .. })));
    }

    #[test]
    fn test_service_for_url() {
        assert_eq!(service_for_url("https://play.max.com/video/watch/1"), StreamingService::Max);
        assert_eq!(service_for_url("https://example.com/watch/1"), StreamingService::Other);
        assert_eq!(service_for_url("/watch/1"), StreamingService::Other);
    }

    #[tokio::test]
    async fn test_movie_page_is_not_series() {
        let snapshot = PageSnapshot {
            url: "https://www.hulu.com/movie/heat".to_string(),
            series: None,
            item: Some(QueueItem::movie("h", "Heat", "https://www.hulu.com/watch/h", StreamingService::Hulu)),
        };
        let adapter = SnapshotAdapter::new(StreamingService::Hulu, snapshot);
        assert!(!adapter.is_series_page().await.unwrap());
        assert!(adapter.get_series_data().await.is_err());
        assert_eq!(adapter.extract_single_item().await.unwrap().unwrap().id, "h");
    }
}
