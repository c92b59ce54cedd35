//! Request Sequencing
//!
//! Asynchronous loads and translations follow "latest request wins": every
//! request takes a [`RequestTicket`], and issuing a newer ticket cancels all
//! older ones. Workers check their ticket at each await point and the owner
//! drops results whose ticket was superseded.

use crate::{MessagesError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Issues monotonically increasing request tickets
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    latest: Arc<AtomicU64>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every outstanding ticket
    pub fn next(&self) -> RequestTicket {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RequestTicket {
            seq,
            latest: self.latest.clone(),
        }
    }

    /// Sequence number of the newest request
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Cancel every outstanding ticket without starting a request
    pub fn cancel_all(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

/// Handle for one in-flight request
#[derive(Debug, Clone)]
pub struct RequestTicket {
    seq: u64,
    latest: Arc<AtomicU64>,
}

impl RequestTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// True once a newer request was issued or everything was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.seq
    }

    /// Fail with [`MessagesError::Cancelled`] if the ticket was superseded
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(MessagesError::Cancelled(format!(
                "request {} superseded by {}",
                self.seq,
                self.latest.load(Ordering::SeqCst)
            )))
        } else {
            Ok(())
        }
    }
}
