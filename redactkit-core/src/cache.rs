// redactkit-core/src/cache.rs
//! Bounded LRU memo of whole detection results.
//!
//! One cache belongs to one engine instance. Keys hash the input text together with a
//! fingerprint of the engine's pattern set and options, so a configuration change can never
//! serve a stale result even before `clear()` is called.

use lru::LruCache;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use crate::detection::DetectionResult;
use crate::errors::RedactError;

/// Builds a cache key from the raw text and a configuration fingerprint.
pub fn cache_key(text: &str, config_fingerprint: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    config_fingerprint.hash(&mut hasher);
    text.hash(&mut hasher);
    hasher.finish()
}

/// Thread-safe LRU cache of detection results.
#[derive(Debug)]
pub struct ResultCache {
    inner: Mutex<LruCache<u64, DetectionResult>>,
}

impl ResultCache {
    pub fn new(max_size: usize) -> Result<Self, RedactError> {
        let capacity = NonZeroUsize::new(max_size)
            .ok_or_else(|| RedactError::InvalidConfig("cache_size must be greater than 0".to_string()))?;
        Ok(Self {
            inner: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Returns a copy of the cached result and marks it most recently used.
    pub fn get(&self, key: u64) -> Option<DetectionResult> {
        self.inner.lock().get(&key).cloned()
    }

    /// Stores `value`, evicting the least recently used entry when full.
    pub fn set(&self, key: u64, value: DetectionResult) {
        self.inner.lock().put(key, value);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }
}
