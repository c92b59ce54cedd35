//! Conversation Data Model
//!
//! A [`Conversation`] is the summary of one SMS/MMS thread as shown in the
//! conversation list. A *snapshot* is the full list at one point in time,
//! ordered by last activity (newest first). Within one snapshot a
//! [`ThreadId`] appears at most once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Snippet shown for threads that have no previewable message
pub const EMPTY_SNIPPET: &str = "No messages";

/// Stable per-conversation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub i64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ThreadId {
    fn from(id: i64) -> Self {
        ThreadId(id)
    }
}

/// Summary of an SMS conversation thread for list display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Thread ID
    pub thread_id: ThreadId,
    /// Phone number or address
    pub address: String,
    /// Resolved contact name, if any
    pub contact_name: Option<String>,
    /// Preview of the latest message
    pub snippet: String,
    /// Timestamp of the latest message (ms since epoch)
    pub timestamp: i64,
    /// Number of unread messages
    pub unread_count: u32,
}

impl Conversation {
    /// Create a conversation with no contact name and no unread messages
    pub fn new(thread_id: impl Into<ThreadId>, address: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            address: address.into(),
            contact_name: None,
            snippet: String::new(),
            timestamp: 0,
            unread_count: 0,
        }
    }

    pub fn with_contact_name(mut self, name: impl Into<String>) -> Self {
        self.contact_name = Some(name.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_unread_count(mut self, unread_count: u32) -> Self {
        self.unread_count = unread_count;
        self
    }

    /// Name to show in the list: the contact name, or the raw address
    pub fn display_name(&self) -> &str {
        match self.contact_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.address,
        }
    }

    /// Snippet to show in the list, never empty
    pub fn display_snippet(&self) -> &str {
        if self.snippet.trim().is_empty() {
            EMPTY_SNIPPET
        } else {
            &self.snippet
        }
    }

    pub fn is_read(&self) -> bool {
        self.unread_count == 0
    }

    /// Content equality used by the differ
    ///
    /// Two entries for the same thread render identically when snippet,
    /// contact name and unread count match.
    pub fn same_content(&self, other: &Conversation) -> bool {
        self.snippet == other.snippet
            && self.contact_name == other.contact_name
            && self.unread_count == other.unread_count
    }
}

/// Sort a snapshot by timestamp, newest first
///
/// The sort is stable, so threads with equal timestamps keep their store
/// order.
pub fn sort_by_recency(snapshot: &mut [Conversation]) {
    snapshot.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
