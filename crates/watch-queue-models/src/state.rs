use chrono::Utc;
use serde::{Deserialize, Serialize};
use crate::item::QueueItem;

/// The persisted aggregate: the whole queue, stored as one record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueueState {
    #[serde(default)]
    pub items: Vec<QueueItem>,
    /// Epoch milliseconds of the last mutation
    #[serde(default)]
    pub last_updated: i64,
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl QueueState {
    pub fn empty(now: i64) -> Self {
        Self {
            items: Vec::new(),
            last_updated: now,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Items sorted by their `order` field (display order)
    pub fn ordered(&self) -> Vec<&QueueItem> {
        let mut items: Vec<&QueueItem> = self.items.iter().collect();
        items.sort_by_key(|item| item.order);
        items
    }

    /// Re-derive `order` from array position
    pub fn renumber(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.order = index;
        }
    }

    /// True when `order` equals array position for every item
    pub fn is_dense(&self) -> bool {
        self.items
            .iter()
            .enumerate()
            .all(|(index, item)| item.order == index)
    }
}
