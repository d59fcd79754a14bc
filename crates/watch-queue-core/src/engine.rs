//! Queue reconciliation engine.
//!
//! The only code allowed to change a [`QueueState`]. Every operation reads the
//! stored state once, computes the new state, writes it back once and returns
//! it. The engine does not serialize concurrent callers itself; it is driven
//! by [`crate::owner::QueueOwner`], which runs one operation at a time.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use watch_queue_config::default_watch_markers;
use watch_queue_models::{now_millis, QueueItem, QueueState};
use crate::error::{QueueError, Result};
use crate::store::QueueStore;

/// Result of an `add` or `add_batch`
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub state: QueueState,
    /// Stored id of every input item, in input order (existing id when merged)
    pub ids: Vec<String>,
    pub appended: usize,
    pub merged: usize,
}

pub struct QueueEngine {
    store: Arc<dyn QueueStore>,
    watch_markers: Vec<String>,
}

impl QueueEngine {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self {
            store,
            watch_markers: default_watch_markers(),
        }
    }

    pub fn with_watch_markers(mut self, markers: Vec<String>) -> Self {
        self.watch_markers = markers.into_iter().filter(|m| !m.is_empty()).collect();
        self
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub async fn state(&self) -> Result<QueueState> {
        self.store.read().await
    }

    pub async fn add(&self, item: QueueItem) -> Result<AddOutcome> {
        self.add_batch(vec![item]).await
    }

    /// Reconcile every item against one read of the state and write once
    pub async fn add_batch(&self, items: Vec<QueueItem>) -> Result<AddOutcome> {
        let mut state = self.store.read().await?;
        let now = next_timestamp(state.last_updated);

        let mut ids = Vec::with_capacity(items.len());
        let mut appended = 0;
        let mut merged = 0;
        for item in items {
            match reconcile(&mut state, item, now, &self.watch_markers) {
                Reconciled::Appended(id) => {
                    appended += 1;
                    ids.push(id);
                }
                Reconciled::Merged(id) => {
                    merged += 1;
                    ids.push(id);
                }
            }
        }
        state.last_updated = now;

        self.store.write(&state).await?;
        info!(
            operation = "queue_add",
            appended,
            merged,
            total = state.items.len(),
            "Queue items reconciled"
        );
        Ok(AddOutcome { state, ids, appended, merged })
    }

    /// Delete one entry and close the gap in `order`.
    ///
    /// An unknown id is reported as `NotFound` and nothing is written.
    pub async fn remove(&self, id: &str) -> Result<QueueState> {
        let mut state = self.store.read().await?;
        let position = state
            .position(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        let removed = state.items.remove(position);
        state.renumber();
        state.last_updated = next_timestamp(state.last_updated);

        self.store.write(&state).await?;
        info!(
            operation = "queue_remove",
            id = %removed.id,
            title = %removed.title,
            total = state.items.len(),
            "Queue item removed"
        );
        Ok(state)
    }

    /// Store `items` verbatim in the given sequence with `order = index`.
    ///
    /// No merging happens here: the caller's list is authoritative.
    pub async fn reorder(&self, mut items: Vec<QueueItem>) -> Result<QueueState> {
        let mut seen = HashSet::with_capacity(items.len());
        if let Some(dup) = items.iter().find(|item| !seen.insert(item.id.as_str())) {
            return Err(QueueError::InvalidReorder(format!("duplicate id {}", dup.id)));
        }

        let previous = self.store.read().await?;
        for (index, item) in items.iter_mut().enumerate() {
            item.order = index;
        }
        let state = QueueState {
            items,
            last_updated: next_timestamp(previous.last_updated),
        };

        self.store.write(&state).await?;
        info!(operation = "queue_reorder", total = state.items.len(), "Queue reordered");
        Ok(state)
    }

    pub async fn clear(&self) -> Result<QueueState> {
        // An undecodable record is about to be replaced, so it must not block
        // clearing it. Any other read failure means the write would fail too.
        let previous = match self.store.read().await {
            Ok(state) => state.last_updated,
            Err(QueueError::Serialization(e)) => {
                warn!("Clearing undecodable queue state: {}", e);
                0
            }
            Err(e) => return Err(e),
        };

        let state = QueueState::empty(next_timestamp(previous));
        self.store.write(&state).await?;
        info!(operation = "queue_clear", "Queue cleared");
        Ok(state)
    }
}

enum Reconciled {
    Appended(String),
    Merged(String),
}

/// Fold one incoming item into `state`
fn reconcile(state: &mut QueueState, mut item: QueueItem, now: i64, markers: &[String]) -> Reconciled {
    let key = item.identity_key();

    let by_key = key.as_ref().and_then(|key| {
        state
            .items
            .iter()
            .position(|existing| existing.identity_key().as_ref() == Some(key))
    });
    // A movie re-sent with the id of a queued movie is the same entry. An
    // episode holding that id is a different entry.
    let by_id = match (&key, by_key) {
        (None, None) if !item.id.is_empty() => state
            .items
            .iter()
            .position(|existing| existing.id == item.id && existing.identity_key().is_none()),
        _ => None,
    };

    if let Some(position) = by_key.or(by_id) {
        let existing = &mut state.items[position];
        debug!("Merging '{}' into existing entry {}", item.title, existing.id);
        let merged = merge_item(existing, item, markers);
        *existing = merged;
        return Reconciled::Merged(existing.id.clone());
    }

    if item.id.is_empty() || state.find(&item.id).is_some() {
        item.id = Uuid::new_v4().to_string();
    }
    if item.added_at <= 0 {
        item.added_at = now;
    }
    item.order = state.items.len();

    debug!("Appending '{}' as {} at position {}", item.title, item.id, item.order);
    let id = item.id.clone();
    state.items.push(item);
    Reconciled::Appended(id)
}

/// Merge an incoming record into an existing entry.
///
/// Position, id and creation time stay with the existing entry. The URL is
/// only replaced by a specific watch URL, and a missing duration never erases
/// a known one. Everything else comes from the incoming record.
pub fn merge_item(existing: &QueueItem, incoming: QueueItem, markers: &[String]) -> QueueItem {
    let url = if is_watch_url(&incoming.url, markers) {
        incoming.url
    } else {
        existing.url.clone()
    };
    let duration = incoming.duration.or(existing.duration);

    QueueItem {
        id: existing.id.clone(),
        added_at: existing.added_at,
        order: existing.order,
        url,
        duration,
        ..incoming
    }
}

pub fn is_watch_url(url: &str, markers: &[String]) -> bool {
    markers
        .iter()
        .any(|marker| !marker.is_empty() && url.contains(marker.as_str()))
}

/// Mutation timestamp that never goes backwards
fn next_timestamp(previous: i64) -> i64 {
    now_millis().max(previous)
}
