// ABOUTME: Defines the Message entity, its storage-assigned MessageId, and the NewMessage candidate.
// ABOUTME: Zero-valued fields are omitted on the wire so partial messages never carry placeholders.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by storage when a message is created. Zero means
/// "not yet assigned"; storage only ever hands out positive values.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// True once storage has handed this id out.
    pub const fn is_assigned(self) -> bool {
        self.0 > 0
    }

    fn is_unassigned(&self) -> bool {
        !self.is_assigned()
    }
}

impl From<i64> for MessageId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MessageId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

/// A message that has not been persisted yet. It has no id; the caller
/// decides `sent_time`, storage never overrides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender: String,
    pub sent_time: DateTime<Utc>,
    pub text: String,
}

impl NewMessage {
    /// Create a candidate stamped with the current time.
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::sent_at(sender, Utc::now(), text)
    }

    /// Create a candidate with an explicit send time.
    pub fn sent_at(
        sender: impl Into<String>,
        sent_time: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            sent_time,
            text: text.into(),
        }
    }
}

/// A chat message as it crosses the collection boundary.
///
/// Every field may be at its default value: an update carries only `id` and
/// `text`, a deletion only `id`. Defaulted fields are skipped when
/// serializing, so consumers can treat an absent field as "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    #[serde(skip_serializing_if = "MessageId::is_unassigned")]
    pub id: MessageId,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sender: String,
    #[serde(skip_serializing_if = "is_unset")]
    pub sent_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl Message {
    /// Attach a storage-assigned id to a candidate.
    pub fn from_new(id: MessageId, new: NewMessage) -> Self {
        Self {
            id,
            sender: new.sender,
            sent_time: new.sent_time,
            text: new.text,
        }
    }

    /// A text-only edit of an existing message. `sender` and `sent_time`
    /// stay at their defaults since updates never touch them.
    pub fn edit(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            ..Self::default()
        }
    }

    /// An id-only reference, used to describe a deletion.
    pub fn tombstone(id: MessageId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

fn is_unset(time: &DateTime<Utc>) -> bool {
    *time == DateTime::<Utc>::default()
}
