//! Conversation Cache
//!
//! Holds the last loaded snapshot for a fixed freshness window. The cache is
//! an explicitly owned object: it is created by whoever owns the list, reads
//! time from an injected [`Clock`], and is cleared by explicit
//! [`invalidate`](ConversationCache::invalidate) calls from every write path
//! (see [`crate::events::CacheInvalidator`]).
//!
//! `get`, `put` and `invalidate` take `&self` and are serialized internally,
//! so the cache can be shared behind an `Arc` with a background load.

use crate::Conversation;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default freshness window for a cached snapshot
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock
///
/// Starts at the instant it was created and only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += by;
        }
    }

    /// Set the time elapsed since the clock was created
    pub fn set_elapsed(&self, elapsed: Duration) {
        if let Ok(mut current) = self.elapsed.lock() {
            *current = elapsed;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let elapsed = self.elapsed.lock().map(|e| *e).unwrap_or(Duration::ZERO);
        self.origin + elapsed
    }
}

/// Cache usage counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl CacheStats {
    /// Fraction of `get` calls served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    snapshot: Vec<Conversation>,
    captured_at: Instant,
}

/// Time-bounded cache of the conversation list
pub struct ConversationCache {
    entry: RwLock<Option<CacheEntry>>,
    freshness_window: Duration,
    clock: Arc<dyn Clock>,
    version: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl ConversationCache {
    /// Create a cache with the default window and the system clock
    pub fn new() -> Self {
        Self::with_clock(DEFAULT_FRESHNESS_WINDOW, Arc::new(SystemClock))
    }

    pub fn with_clock(freshness_window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entry: RwLock::new(None),
            freshness_window,
            clock,
            version: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    /// Get the cached snapshot if present and fresh
    ///
    /// A snapshot is stale once more than the freshness window has elapsed
    /// since it was stored.
    pub fn get(&self) -> Option<Vec<Conversation>> {
        let guard = match self.entry.read() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Conversation cache lock poisoned: {}", e);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let now = self.clock.now();
        let fresh = guard.as_ref().and_then(|entry| {
            let age = now.saturating_duration_since(entry.captured_at);
            if age > self.freshness_window {
                debug!("Cached snapshot is stale (age {:?})", age);
                None
            } else {
                Some(entry.snapshot.clone())
            }
        });

        if fresh.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        fresh
    }

    /// Replace the cached snapshot and reset its capture time
    pub fn put(&self, snapshot: Vec<Conversation>) {
        let captured_at = self.clock.now();
        let len = snapshot.len();
        match self.entry.write() {
            Ok(mut guard) => {
                *guard = Some(CacheEntry {
                    snapshot,
                    captured_at,
                });
                self.version.fetch_add(1, Ordering::SeqCst);
                debug!("Cached snapshot of {} conversations", len);
            }
            Err(e) => warn!("Failed to cache snapshot: {}", e),
        }
    }

    /// Store `snapshot` only if nothing was put or invalidated since
    /// `expected_version` was read
    ///
    /// Used by loads that ran concurrently with a mutation: their result may
    /// predate the write and must not repopulate the cache.
    pub fn put_if_unchanged(&self, expected_version: u64, snapshot: Vec<Conversation>) -> bool {
        let captured_at = self.clock.now();
        match self.entry.write() {
            Ok(mut guard) => {
                if self.version.load(Ordering::SeqCst) != expected_version {
                    debug!("Cache changed during load, not caching snapshot");
                    return false;
                }
                *guard = Some(CacheEntry {
                    snapshot,
                    captured_at,
                });
                self.version.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(e) => {
                warn!("Failed to cache snapshot: {}", e);
                false
            }
        }
    }

    /// Discard the cached snapshot
    ///
    /// Safe to call any number of times.
    pub fn invalidate(&self) {
        match self.entry.write() {
            Ok(mut guard) => {
                if guard.take().is_some() {
                    debug!("Conversation cache invalidated");
                }
                self.version.fetch_add(1, Ordering::SeqCst);
                self.invalidations.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!("Failed to invalidate conversation cache: {}", e),
        }
    }

    /// Counter bumped by every `put` and `invalidate`
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConversationCache {
    fn default() -> Self {
        Self::new()
    }
}
