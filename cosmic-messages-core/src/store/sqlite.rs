//! SQLite Message Store
//!
//! Persistent storage for SMS threads synchronized from the phone.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE threads (
//!     thread_id INTEGER PRIMARY KEY,
//!     address TEXT NOT NULL,
//!     contact_name TEXT
//! );
//!
//! CREATE TABLE messages (
//!     id INTEGER PRIMARY KEY,
//!     thread_id INTEGER NOT NULL,
//!     body TEXT NOT NULL,
//!     date INTEGER NOT NULL,
//!     message_type INTEGER NOT NULL,
//!     read INTEGER NOT NULL DEFAULT 0
//! );
//!
//! CREATE INDEX idx_messages_thread_date ON messages(thread_id, date DESC);
//! ```
//!
//! Conversation summaries are computed on read: the snippet is the body of
//! the newest message, the timestamp its date, and the unread count the
//! number of received messages not yet read.

use super::sms_packet::{SmsMessage, SmsMessages, MESSAGE_TYPE_RECEIVED};
use super::{MessageStore, QueryCriteria};
use crate::{Conversation, MessagesError, Result, ThreadId};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const SUMMARY_QUERY: &str = r#"
    SELECT thread_id, address, contact_name, snippet, last_date, unread
    FROM (
        SELECT
            t.thread_id AS thread_id,
            t.address AS address,
            t.contact_name AS contact_name,
            COALESCE((
                SELECT m.body FROM messages m
                WHERE m.thread_id = t.thread_id
                ORDER BY m.date DESC, m.id DESC
                LIMIT 1
            ), '') AS snippet,
            COALESCE((
                SELECT MAX(m.date) FROM messages m
                WHERE m.thread_id = t.thread_id
            ), 0) AS last_date,
            (
                SELECT COUNT(*) FROM messages m
                WHERE m.thread_id = t.thread_id
                  AND m.read = 0
                  AND m.message_type = ?1
            ) AS unread
        FROM threads t
    )
    WHERE (?2 = 0 OR unread > 0)
    ORDER BY last_date DESC, thread_id ASC
    LIMIT ?3 OFFSET ?4
"#;

/// SQLite-backed message store
#[derive(Clone)]
pub struct SqliteMessageStore {
    /// Database connection
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMessageStore {
    /// Open (or create) the store at the given path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        info!("Opened message store at {}", db_path.display());
        Self::from_connection(conn)
    }

    /// Open a private in-memory store (for tests and demos)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| MessagesError::data_access("Lock error", e))
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS threads (
                thread_id INTEGER PRIMARY KEY,
                address TEXT NOT NULL,
                contact_name TEXT
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY,
                thread_id INTEGER NOT NULL,
                body TEXT NOT NULL,
                date INTEGER NOT NULL,
                message_type INTEGER NOT NULL,
                read INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_messages_thread_date
                ON messages(thread_id, date DESC);
            "#,
        )?;

        debug!("Message store schema initialized");
        Ok(())
    }

    /// Insert or replace a single message, creating its thread if needed
    pub fn insert_message(&self, message: &SmsMessage) -> Result<()> {
        let conn = self.lock()?;
        insert_message_row(&conn, message)?;
        debug!(
            "Stored message {} in thread {}",
            message.id, message.thread_id
        );
        Ok(())
    }

    /// Import every message of an SMS packet body in one transaction
    ///
    /// Returns the number of messages written.
    pub fn import_sms_packet(&self, packet: &SmsMessages) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;

        for conversation in &packet.conversations {
            for message in &conversation.messages {
                if message.thread_id != conversation.thread_id {
                    warn!(
                        "Message {} claims thread {} inside thread {}, using the enclosing thread",
                        message.id, message.thread_id, conversation.thread_id
                    );
                }
                let message = SmsMessage {
                    thread_id: conversation.thread_id,
                    ..message.clone()
                };
                insert_message_row(&tx, &message)?;
                written += 1;
            }
        }

        tx.commit()?;
        info!(
            "Imported {} messages across {} conversations",
            written,
            packet.conversations.len()
        );
        Ok(written)
    }

    /// Mark every message of a thread as read
    ///
    /// Returns the number of messages whose state changed.
    pub fn mark_thread_read(&self, thread_id: ThreadId) -> Result<usize> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE messages SET read = 1 WHERE thread_id = ?1 AND read = 0",
            params![thread_id.0],
        )?;
        debug!("Marked {} messages read in thread {}", changed, thread_id);
        Ok(changed)
    }

    /// Delete a thread and its messages
    ///
    /// Returns false if the thread did not exist.
    pub fn delete_thread(&self, thread_id: ThreadId) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM messages WHERE thread_id = ?1",
            params![thread_id.0],
        )?;
        let removed = tx.execute(
            "DELETE FROM threads WHERE thread_id = ?1",
            params![thread_id.0],
        )?;
        tx.commit()?;

        if removed > 0 {
            info!("Deleted thread {}", thread_id);
            Ok(true)
        } else {
            warn!("Thread {} not found", thread_id);
            Ok(false)
        }
    }

    /// Set or clear the resolved contact name of a thread
    pub fn set_contact_name(&self, thread_id: ThreadId, name: Option<&str>) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE threads SET contact_name = ?1 WHERE thread_id = ?2",
            params![name, thread_id.0],
        )?;
        Ok(rows > 0)
    }

    /// Address of a thread, if it exists
    pub fn thread_address(&self, thread_id: ThreadId) -> Result<Option<String>> {
        let conn = self.lock()?;
        let address = conn
            .query_row(
                "SELECT address FROM threads WHERE thread_id = ?1",
                params![thread_id.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(address)
    }

    /// Messages of one thread, oldest first
    pub fn thread_messages(&self, thread_id: ThreadId) -> Result<Vec<SmsMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT m.id, m.thread_id, t.address, m.body, m.date, m.message_type, m.read
            FROM messages m
            JOIN threads t ON t.thread_id = m.thread_id
            WHERE m.thread_id = ?1
            ORDER BY m.date ASC, m.id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![thread_id.0], |row| {
            Ok(SmsMessage {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                address: row.get(2)?,
                body: row.get(3)?,
                date: row.get(4)?,
                message_type: row.get(5)?,
                read: row.get(6)?,
            })
        })?;

        let messages = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// Counter that changes whenever another connection commits a write
    ///
    /// Writes made through this store's own connection leave it unchanged.
    pub fn data_version(&self) -> Result<i64> {
        let conn = self.lock()?;
        let version = conn.query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Count stored messages
    pub fn message_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn insert_message_row(conn: &Connection, message: &SmsMessage) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO threads (thread_id, address) VALUES (?1, ?2)",
        params![message.thread_id, message.address],
    )?;
    conn.execute(
        r#"
        INSERT OR REPLACE INTO messages (id, thread_id, body, date, message_type, read)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            message.id,
            message.thread_id,
            message.body,
            message.date,
            message.message_type,
            message.read,
        ],
    )?;
    Ok(())
}

fn query_summaries(
    conn: &Connection,
    criteria: &QueryCriteria,
) -> rusqlite::Result<Vec<Conversation>> {
    // SQLite treats a negative LIMIT as "no limit"
    let limit = criteria.limit.map(|l| l as i64).unwrap_or(-1);
    let offset = criteria.offset as i64;

    let mut stmt = conn.prepare(SUMMARY_QUERY)?;
    let rows = stmt.query_map(
        params![MESSAGE_TYPE_RECEIVED, criteria.unread_only as i32, limit, offset],
        |row| {
            let unread: i64 = row.get(5)?;
            Ok(Conversation {
                thread_id: ThreadId(row.get(0)?),
                address: row.get(1)?,
                contact_name: row.get(2)?,
                snippet: row.get(3)?,
                timestamp: row.get(4)?,
                unread_count: u32::try_from(unread).unwrap_or(u32::MAX),
            })
        },
    )?;

    let conversations = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(conversations)
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn query(&self, criteria: &QueryCriteria) -> Result<Vec<Conversation>> {
        let conn = Arc::clone(&self.conn);
        let criteria = criteria.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| MessagesError::data_access("Lock error", e))?;
            query_summaries(&conn, &criteria)
                .map_err(|e| MessagesError::data_access("Failed to query conversations", e))
        })
        .await
        .map_err(|e| MessagesError::data_access("Query task failed", e))?
    }
}
