//! Cross-context message contract.
//!
//! Every message is a JSON object tagged by `type`, e.g.
//! `{"type":"REMOVE_FROM_QUEUE","id":"abc"}`. Requests travel towards the
//! owning context; `QUEUE_STATE_UPDATE` and `QUEUE_UPDATED` travel out to
//! listeners.

use serde::{Deserialize, Serialize};
use watch_queue_models::{QueueItem, QueueState};
use crate::error::QueueError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    AddToQueue { item: QueueItem },
    AddBatchToQueue { items: Vec<QueueItem> },
    RemoveFromQueue { id: String },
    ReorderQueue { items: Vec<QueueItem> },
    ClearQueue,
    RequestQueueState,
    QueueStateUpdate { state: QueueState },
    QueueUpdated { change: QueueChange },
    VideoCompleted { url: String },
}

/// What a mutation did, sent ahead of the full state as a hint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QueueChange {
    ItemAdded { id: String },
    ItemsAdded { ids: Vec<String> },
    ItemRemoved { id: String },
    Reordered,
    QueueCleared,
}

/// Reply to a request: `{success, error?, state?}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<QueueState>,
    /// Item the request resolved to, e.g. the next item after a completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<QueueItem>,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::AddToQueue { .. } => "ADD_TO_QUEUE",
            Message::AddBatchToQueue { .. } => "ADD_BATCH_TO_QUEUE",
            Message::RemoveFromQueue { .. } => "REMOVE_FROM_QUEUE",
            Message::ReorderQueue { .. } => "REORDER_QUEUE",
            Message::ClearQueue => "CLEAR_QUEUE",
            Message::RequestQueueState => "REQUEST_QUEUE_STATE",
            Message::QueueStateUpdate { .. } => "QUEUE_STATE_UPDATE",
            Message::QueueUpdated { .. } => "QUEUE_UPDATED",
            Message::VideoCompleted { .. } => "VIDEO_COMPLETED",
        }
    }

    /// Requests that change the stored queue
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Message::AddToQueue { .. }
                | Message::AddBatchToQueue { .. }
                | Message::RemoveFromQueue { .. }
                | Message::ReorderQueue { .. }
                | Message::ClearQueue
        )
    }

    /// Messages sent from the owner to listeners
    pub fn is_notification(&self) -> bool {
        matches!(self, Message::QueueStateUpdate { .. } | Message::QueueUpdated { .. })
    }
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn with_state(state: QueueState) -> Self {
        Self {
            success: true,
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Convert a `success: false` reply into an error
    pub fn into_result(self) -> Result<Self, QueueError> {
        if self.success {
            Ok(self)
        } else {
            Err(QueueError::Rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

impl From<&QueueError> for Response {
    fn from(error: &QueueError) -> Self {
        Response::failure(error.to_string())
    }
}
