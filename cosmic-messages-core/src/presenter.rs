//! List Presenter
//!
//! Applies diff scripts to the rows a view is currently showing. Rows are
//! produced by a caller-supplied `bind` function, so the presenter works with
//! any row representation (widgets, strings, view models).
//!
//! Only `Insert` and `Update` operations call `bind`; removes and moves shuffle
//! the rows that already exist.

use crate::diff::{DiffOp, DiffScript};
use crate::{Conversation, ThreadId};
use tracing::{debug, warn};

/// Result of applying one script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentOutcome {
    /// Number of rows passed to `bind`
    pub rebound: usize,
    /// First visible row after the script was applied
    pub first_visible: usize,
}

/// Rows currently presented, keyed by thread id
#[derive(Debug, Clone)]
pub struct ListPresenter<R> {
    rows: Vec<(ThreadId, R)>,
    first_visible: usize,
}

impl<R> ListPresenter<R> {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            first_visible: 0,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &R> {
        self.rows.iter().map(|(_, row)| row)
    }

    pub fn row(&self, position: usize) -> Option<&R> {
        self.rows.get(position).map(|(_, row)| row)
    }

    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.rows.iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the empty-state view should be shown
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_visible(&self) -> usize {
        self.first_visible
    }

    /// Record the scroll position reported by the view
    pub fn set_first_visible(&mut self, position: usize) {
        self.first_visible = position.min(self.rows.len().saturating_sub(1));
    }

    /// Thread shown at the top of the viewport
    pub fn anchor(&self) -> Option<ThreadId> {
        self.rows.get(self.first_visible).map(|(id, _)| *id)
    }

    /// Apply a script, re-binding only inserted and updated rows
    ///
    /// The anchor thread stays at the top of the viewport when it survives.
    /// When it was removed, the viewport keeps its position, clamped to the
    /// new end of the list.
    pub fn apply<F>(&mut self, script: &DiffScript, mut bind: F) -> PresentOutcome
    where
        F: FnMut(usize, &Conversation) -> R,
    {
        let anchor = self.anchor();
        let mut rebound = 0;

        for op in script {
            match op {
                DiffOp::Remove { position } if *position < self.rows.len() => {
                    self.rows.remove(*position);
                }
                DiffOp::Move { from, to } if *from < self.rows.len() && *to < self.rows.len() => {
                    let row = self.rows.remove(*from);
                    self.rows.insert(*to, row);
                }
                DiffOp::Insert { position, item } if *position <= self.rows.len() => {
                    let row = bind(*position, item);
                    self.rows.insert(*position, (item.thread_id, row));
                    rebound += 1;
                }
                DiffOp::Update { position, item } if *position < self.rows.len() => {
                    let row = bind(*position, item);
                    self.rows[*position] = (item.thread_id, row);
                    rebound += 1;
                }
                other => warn!(
                    "Presenter skipping {:?} with {} rows",
                    other,
                    self.rows.len()
                ),
            }
        }

        self.first_visible = match anchor.and_then(|id| self.position_of(id)) {
            Some(position) => position,
            None => self.first_visible.min(self.rows.len().saturating_sub(1)),
        };

        debug!(
            "Presented {} operations, rebound {} rows, first visible {}",
            script.len(),
            rebound,
            self.first_visible
        );

        PresentOutcome {
            rebound,
            first_visible: self.first_visible,
        }
    }

    fn position_of(&self, thread_id: ThreadId) -> Option<usize> {
        self.rows.iter().position(|(id, _)| *id == thread_id)
    }
}

impl<R> Default for ListPresenter<R> {
    fn default() -> Self {
        Self::new()
    }
}
