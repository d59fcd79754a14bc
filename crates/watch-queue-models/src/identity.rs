use crate::item::{ItemKind, QueueItem};

/// Merge key for episodes: `(series_title, season_number, episode_number)`.
///
/// The same episode scraped on different visits usually carries a different
/// generated id, so this tuple is what recognises it as one queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub series_title: String,
    pub season_number: u32,
    pub episode_number: u32,
}

/// Identity key of an item, `None` for movies.
///
/// Movies have no merge key: two movie entries are never merged automatically.
pub fn identity_key(item: &QueueItem) -> Option<IdentityKey> {
    match &item.kind {
        ItemKind::Episode(info) => Some(IdentityKey {
            series_title: info.series_title.clone(),
            season_number: info.season_number,
            episode_number: info.episode_number,
        }),
        ItemKind::Movie => None,
    }
}
