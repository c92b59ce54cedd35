//! Translation Cache
//!
//! Bounded in-memory cache of finished translations. When full, the entry
//! inserted first is evicted.

use super::Translation;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Default number of cached translations
pub const DEFAULT_TRANSLATION_CACHE_CAPACITY: usize = 50;

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Translation>,
    order: VecDeque<String>,
}

/// Bounded cache keyed by [`TranslationCache::key`]
#[derive(Debug)]
pub struct TranslationCache {
    entries: Mutex<Entries>,
    capacity: usize,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity: capacity.max(1),
        }
    }

    /// Cache key for a text, its source language (or `auto`) and the target
    pub fn key(text: &str, source_language: Option<&str>, target_language: &str) -> String {
        format!(
            "{}_{}_{}",
            text,
            source_language.unwrap_or("auto"),
            target_language
        )
    }

    pub fn get(&self, key: &str) -> Option<Translation> {
        match self.entries.lock() {
            Ok(entries) => entries.map.get(key).cloned(),
            Err(e) => {
                warn!("Translation cache lock poisoned: {}", e);
                None
            }
        }
    }

    pub fn put(&self, key: String, translation: Translation) {
        let Ok(mut entries) = self.entries.lock() else {
            warn!("Translation cache lock poisoned, not caching");
            return;
        };

        if entries.map.insert(key.clone(), translation).is_none() {
            entries.order.push_back(key);
        }

        while entries.map.len() > self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.map.remove(&oldest);
                    debug!("Evicted cached translation");
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.map.clear();
            entries.order.clear();
        }
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSLATION_CACHE_CAPACITY)
    }
}
