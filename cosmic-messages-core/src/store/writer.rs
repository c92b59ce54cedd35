//! Message Writer
//!
//! Owner of every write to the [`SqliteMessageStore`]. After a successful
//! write it invalidates the attached [`ConversationCache`] and publishes the
//! matching [`MutationEvent`] on the [`MutationBus`], so no write path can
//! leave a stale list behind.
//!
//! Writes made by other processes bypass the writer. They are picked up by
//! [`MessageWriter::detect_external_changes`], which compares the SQLite
//! `data_version` counter against the last value it saw.

use super::sms_packet::{SmsMessage, SmsMessages};
use super::sqlite::SqliteMessageStore;
use crate::cache::ConversationCache;
use crate::events::{MutationBus, MutationEvent};
use crate::{Result, ThreadId};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const NO_DATA_VERSION: i64 = i64::MIN;

/// Write access to the message store that keeps readers in sync
#[derive(Clone)]
pub struct MessageWriter {
    store: SqliteMessageStore,
    bus: MutationBus,
    cache: Option<Arc<ConversationCache>>,
    data_version: Arc<AtomicI64>,
}

impl MessageWriter {
    pub fn new(store: SqliteMessageStore, bus: MutationBus) -> Self {
        Self {
            store,
            bus,
            cache: None,
            data_version: Arc::new(AtomicI64::new(NO_DATA_VERSION)),
        }
    }

    /// Invalidate `cache` directly on every write, before the event is
    /// published
    pub fn with_cache(mut self, cache: Arc<ConversationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn store(&self) -> &SqliteMessageStore {
        &self.store
    }

    pub fn bus(&self) -> &MutationBus {
        &self.bus
    }

    fn notify(&self, events: impl IntoIterator<Item = MutationEvent>) {
        let mut events = events.into_iter().peekable();
        if events.peek().is_none() {
            return;
        }
        if let Some(cache) = &self.cache {
            cache.invalidate();
        }
        for event in events {
            self.bus.publish(event);
        }
    }

    /// Store one message and announce it as sent or received
    pub fn insert_message(&self, message: &SmsMessage) -> Result<()> {
        self.store.insert_message(message)?;

        let thread_id = ThreadId(message.thread_id);
        let event = if message.is_sent() {
            MutationEvent::MessageSent { thread_id }
        } else {
            MutationEvent::MessageReceived { thread_id }
        };
        self.notify([event]);
        Ok(())
    }

    /// Import an SMS packet, announcing one received event per thread
    ///
    /// Returns the number of messages written.
    pub fn import_sms_packet(&self, packet: &SmsMessages) -> Result<usize> {
        let written = self.store.import_sms_packet(packet)?;
        if written == 0 {
            return Ok(0);
        }

        let threads: BTreeSet<i64> = packet
            .conversations
            .iter()
            .filter(|c| !c.messages.is_empty())
            .map(|c| c.thread_id)
            .collect();
        self.notify(threads.into_iter().map(|thread_id| {
            MutationEvent::MessageReceived {
                thread_id: ThreadId(thread_id),
            }
        }));
        Ok(written)
    }

    /// Mark a thread read; returns the number of messages that changed
    pub fn mark_thread_read(&self, thread_id: ThreadId) -> Result<usize> {
        let changed = self.store.mark_thread_read(thread_id)?;
        if changed > 0 {
            self.notify([MutationEvent::ReadStateChanged { thread_id }]);
        }
        Ok(changed)
    }

    /// Delete a thread; returns false if it did not exist
    pub fn delete_thread(&self, thread_id: ThreadId) -> Result<bool> {
        let removed = self.store.delete_thread(thread_id)?;
        if removed {
            self.notify([MutationEvent::ThreadDeleted { thread_id }]);
        }
        Ok(removed)
    }

    /// Set or clear a thread's contact name; returns false if the thread
    /// does not exist
    pub fn set_contact_name(&self, thread_id: ThreadId, name: Option<&str>) -> Result<bool> {
        let Some(address) = self.store.thread_address(thread_id)? else {
            return Ok(false);
        };
        let updated = self.store.set_contact_name(thread_id, name)?;
        if updated {
            self.notify([MutationEvent::ContactUpdated { address }]);
        }
        Ok(updated)
    }

    /// Check whether another process wrote to the store since the last call
    ///
    /// The first call only records the current counter and returns false.
    pub fn detect_external_changes(&self) -> Result<bool> {
        let current = self.store.data_version()?;
        let previous = self.data_version.swap(current, Ordering::SeqCst);

        if previous == NO_DATA_VERSION {
            debug!("Tracking store data version from {}", current);
            return Ok(false);
        }
        if previous == current {
            return Ok(false);
        }

        info!("Message store changed outside this process");
        self.notify([MutationEvent::ExternalChange]);
        Ok(true)
    }
}
