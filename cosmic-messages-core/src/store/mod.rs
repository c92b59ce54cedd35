//! Message Store Collaborators
//!
//! The conversation pipeline never talks to a concrete database. It reads
//! conversation summaries through the [`MessageStore`] trait:
//!
//! - [`SqliteMessageStore`]: persistent store backed by SQLite, fed by SMS
//!   packets synchronized from the phone
//! - [`MemoryMessageStore`]: in-memory store for tests and demos
//!
//! Stores return rows in their natural order; ordering by recency and
//! duplicate handling are the loader's job. Writes go through a
//! [`MessageWriter`] so every mutation reaches the cache and the bus.

pub mod sms_packet;
pub mod sqlite;
pub mod writer;

pub use sms_packet::{SmsConversation, SmsMessage, SmsMessages, PACKET_TYPE_SMS_MESSAGES};
pub use sqlite::SqliteMessageStore;
pub use writer::MessageWriter;

use crate::{Conversation, MessagesError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Default number of conversations per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Selection criteria for a conversation query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCriteria {
    /// Maximum number of conversations to return (None = all)
    pub limit: Option<usize>,
    /// Number of conversations to skip before the first returned one
    pub offset: usize,
    /// Only return threads with unread messages
    pub unread_only: bool,
}

impl QueryCriteria {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Criteria for one page of `page_size` conversations
    pub fn page(self, offset: usize, page_size: usize) -> Self {
        self.with_offset(offset).with_limit(page_size)
    }

    pub fn unread_only(mut self) -> Self {
        self.unread_only = true;
        self
    }
}

/// Source of conversation summaries
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Query conversation summaries
    ///
    /// Fails with [`MessagesError::DataAccess`] (or a converted database
    /// error) when the store cannot be read.
    async fn query(&self, criteria: &QueryCriteria) -> Result<Vec<Conversation>>;
}

/// In-memory message store
///
/// Clones share the same rows, so a test can keep a handle and mutate the
/// store while a loader reads from it.
#[derive(Debug, Clone, Default)]
pub struct MemoryMessageStore {
    rows: Arc<Mutex<Vec<Conversation>>>,
    failing: Arc<AtomicBool>,
    queries: Arc<AtomicUsize>,
}

impl MemoryMessageStore {
    pub fn new(rows: Vec<Conversation>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
            ..Default::default()
        }
    }

    /// Replace every row
    pub fn set_rows(&self, rows: Vec<Conversation>) {
        if let Ok(mut guard) = self.rows.lock() {
            *guard = rows;
        }
    }

    /// Insert a row or replace the row with the same thread id
    pub fn upsert(&self, conversation: Conversation) {
        if let Ok(mut guard) = self.rows.lock() {
            match guard
                .iter_mut()
                .find(|c| c.thread_id == conversation.thread_id)
            {
                Some(existing) => *existing = conversation,
                None => guard.push(conversation),
            }
        }
    }

    /// Make subsequent queries fail (simulates an unreachable provider)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of queries served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn query(&self, criteria: &QueryCriteria) -> Result<Vec<Conversation>> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(MessagesError::DataAccess(
                "memory store unavailable".to_string(),
            ));
        }

        let rows = self
            .rows
            .lock()
            .map_err(|e| MessagesError::data_access("Lock error", e))?;

        let result: Vec<Conversation> = rows
            .iter()
            .filter(|c| !criteria.unread_only || c.unread_count > 0)
            .skip(criteria.offset)
            .take(criteria.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        debug!("Memory store returned {} conversations", result.len());
        Ok(result)
    }
}
