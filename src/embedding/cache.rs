// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded in-memory cache for embedding vectors.
//!
//! Keyed by exact input text (no normalization) so identical texts never hit
//! the backend twice. Entries carry the backend id that produced them; a
//! backend change invalidates on lookup. Capacity-bounded with LRU eviction
//! plus a TTL, unlike the unbounded dict in the source system.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A cached embedding with its provenance.
#[derive(Debug, Clone)]
struct CacheEntry {
    vector: Vec<f32>,
    backend_id: String,
    created_at: Instant,
    last_used: u64,
}

/// LRU + TTL embedding cache.
pub struct EmbeddingCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    clock: u64,
}

impl EmbeddingCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
            clock: 0,
        }
    }

    /// Look up the vector for `text`, if present, fresh, and produced by the
    /// same backend.
    pub fn get(&mut self, text: &str, backend_id: &str) -> Option<Vec<f32>> {
        self.clock += 1;
        let clock = self.clock;
        let ttl = self.ttl;

        let entry = self.entries.get_mut(text)?;
        if entry.backend_id != backend_id || entry.created_at.elapsed() > ttl {
            self.entries.remove(text);
            return None;
        }
        entry.last_used = clock;
        Some(entry.vector.clone())
    }

    /// Insert a vector, evicting the least-recently-used entry when full.
    pub fn put(&mut self, text: &str, backend_id: &str, vector: Vec<f32>) {
        self.clock += 1;
        if !self.entries.contains_key(text) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(
            text.to_string(),
            CacheEntry {
                vector,
                backend_id: backend_id.to_string(),
                created_at: Instant::now(),
                last_used: self.clock,
            },
        );
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> EmbeddingCache {
        EmbeddingCache::new(capacity, Duration::from_secs(60))
    }

    #[test]
    fn put_get_round_trip() {
        let mut cache = cache(4);
        cache.put("hello", "hash-384", vec![0.5; 4]);

        let hit = cache.get("hello", "hash-384").unwrap();
        assert_eq!(hit, vec![0.5; 4]);
    }

    #[test]
    fn backend_change_invalidates() {
        let mut cache = cache(4);
        cache.put("hello", "hash-384", vec![0.5; 4]);
        assert!(cache.get("hello", "hosted-1536").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let mut cache = cache(2);
        cache.put("a", "b", vec![1.0]);
        cache.put("b", "b", vec![2.0]);
        // Touch "a" so "b" becomes the LRU victim.
        cache.get("a", "b").unwrap();
        cache.put("c", "b", vec![3.0]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", "b").is_some());
        assert!(cache.get("b", "b").is_none());
        assert!(cache.get("c", "b").is_some());
    }

    #[test]
    fn ttl_expires_entries() {
        let mut cache = EmbeddingCache::new(4, Duration::from_millis(1));
        cache.put("hello", "b", vec![1.0]);
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("hello", "b").is_none());
    }

    #[test]
    fn exact_text_key_no_normalization() {
        let mut cache = cache(4);
        cache.put("Hello", "b", vec![1.0]);
        assert!(cache.get("hello", "b").is_none());
        assert!(cache.get("Hello ", "b").is_none());
    }
}
