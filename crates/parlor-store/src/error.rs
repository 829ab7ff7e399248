// ABOUTME: Error taxonomy for the persisted message collection.
// ABOUTME: Each variant names the failing operation and wraps the underlying SQLite cause.

use parlor_core::MessageId;
use thiserror::Error;

/// Why the database could not be used.
#[derive(Debug, Error)]
pub enum UnavailableCause {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// The database exists but its schema is not one this build can use.
    #[error("{0}")]
    Schema(String),
}

/// Errors returned by the message collection. The collection never retries;
/// callers decide whether to retry or surface the failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened, configured, migrated, or closed,
    /// or its schema does not match. Fatal at startup.
    #[error("storage unavailable: {op} failed: {source}")]
    StorageUnavailable {
        op: &'static str,
        #[source]
        source: UnavailableCause,
    },

    #[error("query failed: {op}: {source}")]
    QueryFailed {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("message {0} not found")]
    NotFound(MessageId),

    #[error("insert failed: {0}")]
    InsertFailed(#[source] rusqlite::Error),

    /// The insert ran but its id could not be read back. The insert is
    /// rolled back in this case, so no unaddressable row is left behind.
    #[error("identifier retrieval failed after insert: {0}")]
    IdentifierRetrievalFailed(#[source] rusqlite::Error),

    #[error("update of message {id} failed: {source}")]
    UpdateFailed {
        id: MessageId,
        #[source]
        source: rusqlite::Error,
    },

    #[error("delete of message {id} failed: {source}")]
    DeleteFailed {
        id: MessageId,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    pub(crate) fn unavailable(op: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::StorageUnavailable {
            op,
            source: source.into(),
        }
    }

    pub(crate) fn schema(op: &'static str, reason: String) -> Self {
        Self::StorageUnavailable {
            op,
            source: UnavailableCause::Schema(reason),
        }
    }

    pub(crate) fn query(op: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::QueryFailed { op, source }
    }

    /// True for errors that mean the store cannot be used at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}
