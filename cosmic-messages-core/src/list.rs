//! Conversation List
//!
//! Owns the presented snapshot and drives the pipeline:
//!
//! ```text
//! cache hit ──┐
//!             ├─► diff(current, new) ─► presenter.apply ─► status
//! loader ─────┘         (cache.put on a fresh load)
//! ```
//!
//! Loads can run on the runtime via [`ConversationList::spawn_refresh`]. Their
//! results come back through [`ConversationList::commit`], where results of
//! superseded requests are dropped.

use crate::cache::ConversationCache;
use crate::diff::{ConversationDiffer, DiffScript};
use crate::loader::ConversationLoader;
use crate::presenter::{ListPresenter, PresentOutcome};
use crate::request::{RequestSequencer, RequestTicket};
use crate::{Conversation, MessagesError, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the list view should show besides its rows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListStatus {
    /// Nothing loaded yet
    #[default]
    Idle,
    /// Showing a non-empty snapshot
    Loaded,
    /// The store has no conversations
    Empty,
    /// The last load failed; the previous rows are still shown
    Error { message: String },
}

/// Result of a load started by [`ConversationList::spawn_refresh`]
#[derive(Debug)]
pub struct LoadResult {
    ticket: RequestTicket,
    cache_version: u64,
    from_cache: bool,
    result: Result<Vec<Conversation>>,
}

impl LoadResult {
    pub fn ticket(&self) -> &RequestTicket {
        &self.ticket
    }

    pub fn is_superseded(&self) -> bool {
        self.ticket.is_cancelled()
    }
}

/// Outcome of a refresh that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The snapshot was diffed against the current one and presented
    Applied {
        script: DiffScript,
        outcome: PresentOutcome,
        from_cache: bool,
    },
    /// A newer request was issued while this one was loading
    Superseded,
}

/// Conversation list with its cache, loader and presenter
pub struct ConversationList<R> {
    loader: ConversationLoader,
    cache: Arc<ConversationCache>,
    sequencer: RequestSequencer,
    current: Vec<Conversation>,
    presenter: ListPresenter<R>,
    status: ListStatus,
}

impl<R> ConversationList<R> {
    pub fn new(loader: ConversationLoader, cache: Arc<ConversationCache>) -> Self {
        Self {
            loader,
            cache,
            sequencer: RequestSequencer::new(),
            current: Vec::new(),
            presenter: ListPresenter::new(),
            status: ListStatus::Idle,
        }
    }

    /// Snapshot currently presented
    pub fn snapshot(&self) -> &[Conversation] {
        &self.current
    }

    pub fn presenter(&self) -> &ListPresenter<R> {
        &self.presenter
    }

    /// Mutable access for scroll position updates
    pub fn presenter_mut(&mut self) -> &mut ListPresenter<R> {
        &mut self.presenter
    }

    pub fn status(&self) -> &ListStatus {
        &self.status
    }

    pub fn cache(&self) -> &Arc<ConversationCache> {
        &self.cache
    }

    /// Cancel every load still in flight
    pub fn cancel_pending(&self) {
        self.sequencer.cancel_all();
    }

    /// Refresh from the cache, or from the store when the cache is stale
    ///
    /// On a load failure the previous rows stay presented, the status becomes
    /// [`ListStatus::Error`] and the error is returned.
    pub async fn refresh<F>(&mut self, bind: F) -> Result<RefreshOutcome>
    where
        F: FnMut(usize, &Conversation) -> R,
    {
        let ticket = self.sequencer.next();
        let result = fetch(&self.loader, &self.cache, ticket).await;
        self.commit(result, bind)
    }

    /// Start a load on the runtime
    ///
    /// The returned handle resolves to a [`LoadResult`] that must be passed
    /// to [`commit`](Self::commit). Starting another refresh supersedes this
    /// one.
    pub fn spawn_refresh(&self) -> JoinHandle<LoadResult> {
        let ticket = self.sequencer.next();
        let loader = self.loader.clone();
        let cache = self.cache.clone();
        tokio::spawn(async move { fetch(&loader, &cache, ticket).await })
    }

    /// Present the result of a load
    pub fn commit<F>(&mut self, result: LoadResult, bind: F) -> Result<RefreshOutcome>
    where
        F: FnMut(usize, &Conversation) -> R,
    {
        if result.is_superseded() {
            debug!(
                "Discarding result of superseded request {}",
                result.ticket.seq()
            );
            return Ok(RefreshOutcome::Superseded);
        }

        match result.result {
            Ok(snapshot) => {
                if !result.from_cache {
                    self.cache.put_if_unchanged(result.cache_version, snapshot.clone());
                }
                Ok(self.present(snapshot, result.from_cache, bind))
            }
            Err(MessagesError::Cancelled(reason)) => {
                debug!("Load cancelled: {}", reason);
                Ok(RefreshOutcome::Superseded)
            }
            Err(e) => {
                warn!("Failed to load conversations: {}", e);
                self.status = ListStatus::Error {
                    message: e.user_message(),
                };
                Err(e)
            }
        }
    }

    fn present<F>(&mut self, snapshot: Vec<Conversation>, from_cache: bool, bind: F) -> RefreshOutcome
    where
        F: FnMut(usize, &Conversation) -> R,
    {
        let script = ConversationDiffer::diff(&self.current, &snapshot);
        let outcome = self.presenter.apply(&script, bind);
        self.current = snapshot;
        self.status = if self.current.is_empty() {
            ListStatus::Empty
        } else {
            ListStatus::Loaded
        };

        info!(
            "Conversation list refreshed: {} conversations, {} operations{}",
            self.current.len(),
            script.len(),
            if from_cache { " (cached)" } else { "" }
        );

        RefreshOutcome::Applied {
            script,
            outcome,
            from_cache,
        }
    }
}

async fn fetch(
    loader: &ConversationLoader,
    cache: &ConversationCache,
    ticket: RequestTicket,
) -> LoadResult {
    let cache_version = cache.version();
    if let Some(snapshot) = cache.get() {
        return LoadResult {
            ticket,
            cache_version,
            from_cache: true,
            result: Ok(snapshot),
        };
    }

    let result = match ticket.check() {
        Ok(()) => loader.load().await,
        Err(e) => Err(e),
    };
    LoadResult {
        ticket,
        cache_version,
        from_cache: false,
        result,
    }
}
