// ABOUTME: Change events describing mutations of the message collection for subscribers.
// ABOUTME: Serialized with a { type, payload } envelope; snapshots seed newly joined clients.

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageId};

/// A change to the collection, or the full state for a client that just joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ChangeEvent {
    /// Every message currently stored.
    Snapshot(Vec<Message>),
    /// A newly created message, id included.
    Created(Message),
    /// A text edit; carries only `id` and `text`.
    Updated(Message),
    /// A removal; carries only `id`.
    Deleted(Message),
}

impl ChangeEvent {
    pub fn updated(id: MessageId, text: impl Into<String>) -> Self {
        Self::Updated(Message::edit(id, text))
    }

    pub fn deleted(id: MessageId) -> Self {
        Self::Deleted(Message::tombstone(id))
    }

    /// Name used as the SSE event type.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
            Self::Deleted(_) => "deleted",
        }
    }
}
