//! Mutation Events
//!
//! Every write path (sending, receiving, deleting, marking read, contact
//! changes) publishes a [`MutationEvent`] on a [`MutationBus`]. The
//! [`CacheInvalidator`] listens on the bus and clears the conversation cache
//! so the next refresh reloads from the store.

use crate::cache::ConversationCache;
use crate::ThreadId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default capacity of the mutation channel
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// A change to the underlying message data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MutationEvent {
    /// A message was sent in a thread
    MessageSent { thread_id: ThreadId },

    /// A message was received in a thread
    MessageReceived { thread_id: ThreadId },

    /// A thread and all of its messages were deleted
    ThreadDeleted { thread_id: ThreadId },

    /// Messages in a thread were marked read or unread
    ReadStateChanged { thread_id: ThreadId },

    /// A contact's display name changed
    ContactUpdated { address: String },

    /// The store was written by another process
    ExternalChange,
}

impl MutationEvent {
    /// Thread affected by the event, if it targets a single thread
    pub fn thread_id(&self) -> Option<ThreadId> {
        match self {
            MutationEvent::MessageSent { thread_id }
            | MutationEvent::MessageReceived { thread_id }
            | MutationEvent::ThreadDeleted { thread_id }
            | MutationEvent::ReadStateChanged { thread_id } => Some(*thread_id),
            MutationEvent::ContactUpdated { .. } | MutationEvent::ExternalChange => None,
        }
    }
}

/// Broadcast channel for mutation events
#[derive(Debug, Clone)]
pub struct MutationBus {
    sender: broadcast::Sender<MutationEvent>,
}

impl MutationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: MutationEvent) -> usize {
        debug!("Publishing mutation event: {:?}", event);
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MutationBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// Background task that invalidates the cache on every mutation
pub struct CacheInvalidator {
    handle: JoinHandle<()>,
}

impl CacheInvalidator {
    /// Subscribe to `bus` and start invalidating `cache`
    ///
    /// The subscription is taken before this returns, so events published
    /// afterwards are never missed.
    pub fn spawn(bus: &MutationBus, cache: Arc<ConversationCache>) -> Self {
        let mut receiver = bus.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        debug!("Invalidating conversation cache after {:?}", event);
                        cache.invalidate();
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "Cache invalidator lagged behind by {} events, invalidating",
                            skipped
                        );
                        cache.invalidate();
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Mutation bus closed, cache invalidator stopping");
                        break;
                    }
                }
            }
        });

        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop listening for events
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::Conversation;
    use std::time::Duration;

    fn cache() -> Arc<ConversationCache> {
        Arc::new(ConversationCache::with_clock(
            Duration::from_secs(30),
            Arc::new(ManualClock::new()),
        ))
    }

    async fn wait_for_invalidations(cache: &ConversationCache, count: u64) {
        for _ in 0..100 {
            if cache.stats().invalidations >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cache was not invalidated");
    }

    #[test]
    fn test_event_thread_id() {
        let event = MutationEvent::MessageReceived {
            thread_id: ThreadId(9),
        };
        assert_eq!(event.thread_id(), Some(ThreadId(9)));

        let event = MutationEvent::ContactUpdated {
            address: "+1".into(),
        };
        assert_eq!(event.thread_id(), None);
        assert_eq!(MutationEvent::ExternalChange.thread_id(), None);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = MutationBus::default();
        assert_eq!(
            bus.publish(MutationEvent::ThreadDeleted {
                thread_id: ThreadId(1)
            }),
            0
        );
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(MutationEvent::ReadStateChanged {
            thread_id: ThreadId(4),
        })
        .unwrap();
        assert_eq!(json["event"], "read_state_changed");
        assert_eq!(json["thread_id"], 4);

        let json = serde_json::to_value(MutationEvent::ExternalChange).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "external_change" }));
    }

    #[tokio::test]
    async fn test_invalidator_clears_cache() {
        let bus = MutationBus::default();
        let cache = cache();
        cache.put(vec![Conversation::new(1, "+1")]);

        let invalidator = CacheInvalidator::spawn(&bus, cache.clone());
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(MutationEvent::MessageSent {
            thread_id: ThreadId(1),
        });
        wait_for_invalidations(&cache, 1).await;
        assert!(cache.get().is_none());

        invalidator.shutdown();
    }

    #[tokio::test]
    async fn test_invalidator_stops_when_bus_dropped() {
        let bus = MutationBus::default();
        let invalidator = CacheInvalidator::spawn(&bus, cache());
        drop(bus);

        for _ in 0..100 {
            if invalidator.is_finished() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("invalidator kept running after the bus closed");
    }
}
