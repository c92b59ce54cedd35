//! Conversation Loader
//!
//! Reads a full snapshot from a [`MessageStore`] and normalizes it: newest
//! thread first, one entry per thread id. Long lists can also be read page
//! by page with [`ConversationLoader::load_page`].

use crate::conversation::sort_by_recency;
use crate::store::{MessageStore, QueryCriteria};
use crate::{Conversation, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// One page of conversations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    /// Offset of the first conversation of this page
    pub offset: usize,
    /// Offset of the page after this one
    pub next_offset: usize,
    /// The store returned a full page, so another one may follow
    pub has_more: bool,
}

/// Loads conversation snapshots from the message store
#[derive(Clone)]
pub struct ConversationLoader {
    store: Arc<dyn MessageStore>,
    criteria: QueryCriteria,
}

impl ConversationLoader {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            criteria: QueryCriteria::default(),
        }
    }

    pub fn with_criteria(mut self, criteria: QueryCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn criteria(&self) -> &QueryCriteria {
        &self.criteria
    }

    /// Load a snapshot ordered by timestamp, newest first
    ///
    /// Store failures are returned unchanged; the caller decides whether to
    /// retry or keep showing a cached list. An empty store is a valid,
    /// empty snapshot.
    pub async fn load(&self) -> Result<Vec<Conversation>> {
        let rows = self.store.query(&self.criteria).await?;
        Ok(normalize(rows))
    }

    /// Load `page_size` conversations starting at `offset`
    ///
    /// The loader's own limit and offset are replaced by the page bounds;
    /// its other criteria still apply. `has_more` is set when the store
    /// filled the page.
    pub async fn load_page(&self, offset: usize, page_size: usize) -> Result<ConversationPage> {
        if page_size == 0 {
            return Ok(ConversationPage {
                conversations: Vec::new(),
                offset,
                next_offset: offset,
                has_more: false,
            });
        }

        let criteria = self.criteria.clone().page(offset, page_size);
        let rows = self.store.query(&criteria).await?;
        let has_more = rows.len() >= page_size;
        let next_offset = offset + rows.len();

        debug!(
            "Loaded page at offset {} ({} rows, more: {})",
            offset,
            rows.len(),
            has_more
        );
        Ok(ConversationPage {
            conversations: normalize(rows),
            offset,
            next_offset,
            has_more,
        })
    }
}

fn normalize(rows: Vec<Conversation>) -> Vec<Conversation> {
    let row_count = rows.len();

    let mut seen = HashSet::with_capacity(row_count);
    let mut snapshot: Vec<Conversation> = Vec::with_capacity(row_count);
    for row in rows {
        if seen.insert(row.thread_id) {
            snapshot.push(row);
        } else {
            warn!(
                "Store returned thread {} more than once, keeping the first row",
                row.thread_id
            );
        }
    }

    sort_by_recency(&mut snapshot);

    debug!(
        "Loaded {} conversations ({} rows from store)",
        snapshot.len(),
        row_count
    );
    snapshot
}
