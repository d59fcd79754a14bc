use serde::{Deserialize, Serialize};
use crate::identity::IdentityKey;
use crate::service::StreamingService;

/// One entry of the watch queue.
///
/// Serialized in camelCase with the kind flattened in as `"type"`, which is
/// the shape every context reads from and writes to the shared store:
///
/// ```json
/// {"id":"a","title":"Pilot","type":"episode","seriesTitle":"Foo",...}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub kind: ItemKind,
    pub url: String,
    #[serde(default)]
    pub service: StreamingService,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Runtime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// Creation time, epoch milliseconds
    #[serde(default)]
    pub added_at: i64,
    #[serde(default)]
    pub order: usize,
    /// UI-level flag set by consumers; reconciliation never reads it
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub completed: bool,
}

/// Movie or episode. Episode-only fields live in the variant so they are
/// always present together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Movie,
    Episode(EpisodeInfo),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeInfo {
    pub series_id: String,
    pub series_title: String,
    pub season_number: u32,
    pub episode_number: u32,
    pub series_thumbnail_url: String,
}

impl QueueItem {
    pub fn movie(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        service: StreamingService,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: ItemKind::Movie,
            url: url.into(),
            service,
            thumbnail_url: None,
            duration: None,
            added_at: 0,
            order: 0,
            completed: false,
        }
    }

    pub fn episode(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        service: StreamingService,
        episode: EpisodeInfo,
    ) -> Self {
        Self {
            kind: ItemKind::Episode(episode),
            ..Self::movie(id, title, url, service)
        }
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn with_added_at(mut self, added_at: i64) -> Self {
        self.added_at = added_at;
        self
    }

    pub fn is_episode(&self) -> bool {
        matches!(self.kind, ItemKind::Episode(_))
    }

    pub fn episode_info(&self) -> Option<&EpisodeInfo> {
        match &self.kind {
            ItemKind::Episode(info) => Some(info),
            ItemKind::Movie => None,
        }
    }

    /// Merge/dedup key, see [`crate::identity_key`]
    pub fn identity_key(&self) -> Option<IdentityKey> {
        crate::identity::identity_key(self)
    }
}

impl EpisodeInfo {
    pub fn new(
        series_id: impl Into<String>,
        series_title: impl Into<String>,
        season_number: u32,
        episode_number: u32,
    ) -> Self {
        Self {
            series_id: series_id.into(),
            series_title: series_title.into(),
            season_number,
            episode_number,
            series_thumbnail_url: String::new(),
        }
    }

    pub fn with_series_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.series_thumbnail_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_episode_wire_shape() {
        let item = QueueItem::episode(
            "ep-1",
            "Pilot",
            "https://www.netflix.com/watch/1",
            StreamingService::Netflix,
            EpisodeInfo::new("80100172", "Foo", 1, 2).with_series_thumbnail("https://img/foo.jpg"),
        )
        .with_duration(1200)
        .with_added_at(1_700_000_000_000);

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "episode");
        assert_eq!(value["seriesTitle"], "Foo");
        assert_eq!(value["seasonNumber"], 1);
        assert_eq!(value["episodeNumber"], 2);
        assert_eq!(value["seriesThumbnailUrl"], "https://img/foo.jpg");
        assert_eq!(value["addedAt"], 1_700_000_000_000i64);
        assert!(value.get("thumbnailUrl").is_none());
        assert!(value.get("completed").is_none());
    }

    #[test]
    fn test_movie_from_stored_json() {
        let item: QueueItem = serde_json::from_value(json!({
            "id": "m-1",
            "title": "Heat",
            "type": "movie",
            "url": "https://www.primevideo.com/detail/abc",
            "service": "primevideo",
            "thumbnailUrl": "https://img/heat.jpg",
            "addedAt": 12,
            "order": 3,
            "completed": true
        }))
        .unwrap();

        assert_eq!(item.kind, ItemKind::Movie);
        assert_eq!(item.service, StreamingService::Primevideo);
        assert_eq!(item.thumbnail_url.as_deref(), Some("https://img/heat.jpg"));
        assert_eq!(item.order, 3);
        assert!(item.completed);
        assert!(item.episode_info().is_none());
    }

    #[test]
    fn test_episode_requires_all_fields() {
        let missing_season = json!({
            "id": "e",
            "title": "Pilot",
            "type": "episode",
            "url": "/watch/1",
            "seriesId": "s",
            "seriesTitle": "Foo",
            "episodeNumber": 1,
            "seriesThumbnailUrl": ""
        });
        assert!(serde_json::from_value::<QueueItem>(missing_season).is_err());
    }
}
