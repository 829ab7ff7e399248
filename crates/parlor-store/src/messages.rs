// ABOUTME: SQLite-backed message store implementing the collection CRUD contract.
// ABOUTME: Owns one connection behind a mutex; create inserts and reads back its id atomically.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parlor_core::{Message, MessageId, NewMessage};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::collection::MessageCollection;
use crate::error::StoreError;
use crate::schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The persisted message collection. The store is the only writer of its
/// database; every read goes to SQLite, nothing is cached.
///
/// Opened once at startup and closed with [`MessageStore::close`] (or by
/// dropping it) at shutdown.
pub struct MessageStore {
    conn: Mutex<Connection>,
}

impl MessageStore {
    /// Open or create the database at `path` and migrate it to the latest
    /// schema. The parent directory must already exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(StoreError::unavailable("open"))?;
        tracing::info!(path = %path.display(), "opened message database");
        Self::init(conn)
    }

    /// Open a private in-memory database. Contents vanish on close.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::unavailable("open"))?;
        Self::init(conn)
    }

    fn init(mut conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(StoreError::unavailable("configure journal"))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(StoreError::unavailable("configure busy timeout"))?;

        let version = schema::ensure_schema(&mut conn)?;
        tracing::debug!(version, "message schema ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Schema version currently recorded in the database.
    pub fn schema_version(&self) -> Result<i64, StoreError> {
        schema::current_version(&self.conn()).map_err(StoreError::query("schema_version"))
    }

    /// Close the underlying connection, reporting any failure to flush.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        conn.close()
            .map_err(|(_, source)| StoreError::unavailable("close")(source))?;
        tracing::info!("closed message database");
        Ok(())
    }

    // Every mutation is a single statement or a transaction, so a panic in
    // another holder cannot leave the connection half-written.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `new` and read its id back with `read_id`, in one transaction.
    fn create_with(
        &self,
        new: NewMessage,
        read_id: fn(&Connection) -> rusqlite::Result<i64>,
    ) -> Result<Message, StoreError> {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::InsertFailed)?;

        tx.execute(
            "INSERT INTO messages (sender, sent_time, text) VALUES (?1, ?2, ?3)",
            params![new.sender, new.sent_time.to_rfc3339(), new.text],
        )
        .map_err(StoreError::InsertFailed)?;

        // Dropping the transaction on error rolls the insert back.
        let raw_id = read_id(&tx).map_err(StoreError::IdentifierRetrievalFailed)?;

        tx.commit().map_err(StoreError::InsertFailed)?;

        let id = MessageId::new(raw_id);
        tracing::debug!(%id, sender = %new.sender, "created message");
        Ok(Message::from_new(id, new))
    }
}

fn inserted_id(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT id FROM messages WHERE rowid = last_insert_rowid()",
        [],
        |row| row.get(0),
    )
}

impl MessageCollection for MessageStore {
    fn read_all(&self) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, sender, sent_time, text FROM messages ORDER BY id ASC")
            .map_err(StoreError::query("read_all"))?;

        let rows = stmt
            .query_map([], message_from_row)
            .map_err(StoreError::query("read_all"))?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.map_err(StoreError::query("read_all"))?);
        }
        Ok(messages)
    }

    fn read_one(&self, id: MessageId) -> Result<Message, StoreError> {
        self.conn()
            .query_row(
                "SELECT id, sender, sent_time, text FROM messages WHERE id = ?1",
                params![id.get()],
                message_from_row,
            )
            .optional()
            .map_err(StoreError::query("read_one"))?
            .ok_or(StoreError::NotFound(id))
    }

    fn create(&self, new: NewMessage) -> Result<Message, StoreError> {
        self.create_with(new, inserted_id)
    }

    fn update(&self, message: &Message) -> Result<(), StoreError> {
        let id = message.id;
        let changed = self
            .conn()
            .execute(
                "UPDATE messages SET text = ?1 WHERE id = ?2",
                params![message.text, id.get()],
            )
            .map_err(|source| StoreError::UpdateFailed { id, source })?;

        if changed == 0 {
            tracing::debug!(%id, "update matched no message");
        } else {
            tracing::debug!(%id, "updated message text");
        }
        Ok(())
    }

    fn delete(&self, id: MessageId) -> Result<(), StoreError> {
        let changed = self
            .conn()
            .execute("DELETE FROM messages WHERE id = ?1", params![id.get()])
            .map_err(|source| StoreError::DeleteFailed { id, source })?;

        if changed == 0 {
            tracing::debug!(%id, "delete matched no message");
        } else {
            tracing::debug!(%id, "deleted message");
        }
        Ok(())
    }
}

/// `sent_time` column value, stored as RFC 3339 text.
struct StoredTime(DateTime<Utc>);

impl FromSql for StoredTime {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|t| Self(t.with_timezone(&Utc)))
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Map a row by column name. A missing column or a value of the wrong type
/// fails the whole query instead of yielding a partial message.
fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let id: i64 = row.get("id")?;
    let sent_time: StoredTime = row.get("sent_time")?;
    Ok(Message {
        id: MessageId::new(id),
        sender: row.get("sender")?,
        sent_time: sent_time.0,
        text: row.get("text")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn open_temp() -> (TempDir, MessageStore) {
        let dir = TempDir::new().unwrap();
        let store = MessageStore::open(&dir.path().join("messages.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn chat_scenario() {
        let (_dir, store) = open_temp();

        let alice = store
            .create(NewMessage::sent_at("alice", t(1), "hi"))
            .unwrap();
        assert_eq!(alice.id, MessageId::new(1));
        let bob = store.create(NewMessage::sent_at("bob", t(2), "yo")).unwrap();
        assert_eq!(bob.id, MessageId::new(2));

        let all = store.read_all().unwrap();
        assert_eq!(all, vec![alice.clone(), bob.clone()]);

        store
            .update(&Message::edit(MessageId::new(1), "hi!"))
            .unwrap();
        assert_eq!(store.read_one(MessageId::new(1)).unwrap().text, "hi!");

        store.delete(MessageId::new(2)).unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, MessageId::new(1));
    }

    #[test]
    fn create_then_read_matches_candidate() {
        let (_dir, store) = open_temp();
        let sent = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let new = NewMessage::sent_at("dave", sent, "late night");

        let created = store.create(new.clone()).unwrap();
        let read = store.read_one(created.id).unwrap();

        assert_eq!(read, Message::from_new(created.id, new));
        assert_eq!(read.sent_time, sent, "sub-second precision survives storage");
    }

    #[test]
    fn ids_are_pairwise_distinct() {
        let (_dir, store) = open_temp();
        let mut seen = HashSet::new();

        for i in 0..50 {
            let msg = store.create(NewMessage::new("loop", format!("#{i}"))).unwrap();
            assert!(msg.id.is_assigned());
            assert!(seen.insert(msg.id), "duplicate id {}", msg.id);
        }
    }

    #[test]
    fn deleted_ids_are_never_reused() {
        let (_dir, store) = open_temp();
        store.create(NewMessage::new("a", "one")).unwrap();
        let second = store.create(NewMessage::new("a", "two")).unwrap();

        store.delete(second.id).unwrap();
        let third = store.create(NewMessage::new("a", "three")).unwrap();

        assert_eq!(third.id, MessageId::new(3));
    }

    #[test]
    fn update_changes_only_text_and_is_idempotent() {
        let (_dir, store) = open_temp();
        let created = store
            .create(NewMessage::sent_at("erin", t(3), "draft"))
            .unwrap();

        // Sender and time in the update are ignored.
        let edit = Message {
            id: created.id,
            sender: "mallory".to_string(),
            sent_time: t(9),
            text: "final".to_string(),
        };
        store.update(&edit).unwrap();
        let once = store.read_one(created.id).unwrap();
        store.update(&edit).unwrap();
        let twice = store.read_one(created.id).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.sender, "erin");
        assert_eq!(once.sent_time, t(3));
        assert_eq!(once.text, "final");
    }

    #[test]
    fn delete_then_read_is_not_found() {
        let (_dir, store) = open_temp();
        let created = store.create(NewMessage::new("frank", "bye")).unwrap();

        store.delete(created.id).unwrap();

        let err = store.read_one(created.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == created.id), "{err}");
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn missing_ids_are_silent_noops() {
        let (_dir, store) = open_temp();
        store.create(NewMessage::new("gina", "keep me")).unwrap();
        let before = store.read_all().unwrap();

        store.update(&Message::edit(MessageId::new(99), "ghost")).unwrap();
        store.delete(MessageId::new(99)).unwrap();

        assert_eq!(store.read_all().unwrap(), before);
    }

    #[test]
    fn read_one_on_empty_store_is_not_found() {
        let store = MessageStore::open_in_memory().unwrap();
        let err = store.read_one(MessageId::new(1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn malformed_row_fails_query() {
        let store = MessageStore::open_in_memory().unwrap();
        store
            .conn()
            .execute(
                "INSERT INTO messages (sender, sent_time, text) VALUES ('x', 'not a time', 'y')",
                [],
            )
            .unwrap();

        let err = store.read_all().unwrap_err();
        assert!(matches!(err, StoreError::QueryFailed { op: "read_all", .. }), "{err}");

        let err = store.read_one(MessageId::new(1)).unwrap_err();
        assert!(matches!(err, StoreError::QueryFailed { op: "read_one", .. }), "{err}");
    }

    #[test]
    fn failed_operations_name_their_error() {
        let store = MessageStore::open_in_memory().unwrap();
        store.create(NewMessage::new("ivy", "gone soon")).unwrap();
        store.conn().execute_batch("DROP TABLE messages;").unwrap();

        let err = store.read_all().unwrap_err();
        assert!(matches!(err, StoreError::QueryFailed { op: "read_all", .. }), "{err}");

        let err = store.read_one(MessageId::new(1)).unwrap_err();
        assert!(matches!(err, StoreError::QueryFailed { op: "read_one", .. }), "{err}");

        let err = store.create(NewMessage::new("ivy", "again")).unwrap_err();
        assert!(matches!(err, StoreError::InsertFailed(_)), "{err}");

        let err = store.update(&Message::edit(MessageId::new(1), "edit")).unwrap_err();
        assert!(
            matches!(err, StoreError::UpdateFailed { id, .. } if id == MessageId::new(1)),
            "{err}"
        );

        let err = store.delete(MessageId::new(1)).unwrap_err();
        assert!(
            matches!(err, StoreError::DeleteFailed { id, .. } if id == MessageId::new(1)),
            "{err}"
        );

        assert!(!err.is_fatal());
    }

    #[test]
    fn failed_id_retrieval_rolls_back_insert() {
        let store = MessageStore::open_in_memory().unwrap();

        let err = store
            .create_with(NewMessage::new("jack", "orphan?"), |_| {
                Err(rusqlite::Error::QueryReturnedNoRows)
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::IdentifierRetrievalFailed(_)), "{err}");
        assert!(store.read_all().unwrap().is_empty(), "no orphaned row");

        // The rolled-back row never claimed an id from the sequence.
        let next = store.create(NewMessage::new("jack", "real")).unwrap();
        assert_eq!(next.id, MessageId::new(1));
    }

    #[test]
    fn data_and_schema_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("messages.db");

        let store = MessageStore::open(&path).unwrap();
        let created = store.create(NewMessage::new("hank", "persist")).unwrap();
        assert_eq!(store.schema_version().unwrap(), schema::latest_version());
        store.close().unwrap();

        let store = MessageStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), schema::latest_version());
        assert_eq!(store.read_one(created.id).unwrap().text, "persist");

        let next = store.create(NewMessage::new("hank", "again")).unwrap();
        assert!(next.id > created.id);
    }

    #[test]
    fn open_in_missing_directory_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no-such-dir").join("messages.db");

        let err = MessageStore::open(&path).err().unwrap();
        assert!(matches!(err, StoreError::StorageUnavailable { op: "open", .. }), "{err}");
        assert!(err.is_fatal());
    }

    #[test]
    fn concurrent_creates_get_distinct_ids() {
        let (_dir, store) = open_temp();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|i| {
                            store
                                .create(NewMessage::new(format!("w{worker}"), format!("{i}")))
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(ids.len(), 200);
        assert_eq!(store.read_all().unwrap().len(), 200);
    }
}
