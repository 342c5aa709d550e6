//! LRU result cache
//!
//! Insertion order of the underlying `IndexMap` is recency order: index 0 is
//! the least recently used entry, the last index the most recently used.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use wf_artifact::{InteractivityAssessment, InteractivityLevel};

/// Default number of cached results
pub const DEFAULT_CAPACITY: usize = 50;

/// Display width of keys in [`CacheStats`]
const KEY_DISPLAY_LEN: usize = 50;

/// Normalize a prompt for keying (trim + lowercase)
#[inline]
#[must_use]
pub fn normalize_prompt(prompt: &str) -> String {
    prompt.trim().to_lowercase()
}

/// Cache key for a `(model, prompt)` pair
#[inline]
#[must_use]
pub fn cache_key(prompt: &str, model: &str) -> String {
    format!("{model}:{}", normalize_prompt(prompt))
}

/// One cached generation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// Full cache key
    pub key: String,
    /// Validated code
    pub code: String,
    /// Assessment of `code`
    pub interactivity: InteractivityAssessment,
    /// Model that produced the code
    pub model: String,
    /// Insertion time (Unix millis)
    pub timestamp_ms: i64,
    /// Lookups served since insertion
    pub hit_count: u32,
}

/// Display view of one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryStats {
    /// Key truncated for display
    pub key: String,
    /// Model that produced the code
    pub model: String,
    /// Lookups served since insertion
    pub hit_count: u32,
    /// Level of the cached assessment
    pub interactivity_level: InteractivityLevel,
    /// Insertion time (Unix millis)
    pub timestamp: i64,
}

/// Cache inspection snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently cached
    pub size: usize,
    /// Capacity
    pub max_size: usize,
    /// Entries from least to most recently used
    pub entries: Vec<CacheEntryStats>,
}

/// Bounded LRU cache of generation results
///
/// All mutation happens under one mutex so the evict-then-insert sequence
/// and the hit reorder are atomic for concurrent callers.
#[derive(Debug)]
pub struct ResultCache {
    capacity: usize,
    entries: Mutex<IndexMap<String, CacheEntry>>,
}

impl ResultCache {
    /// Create cache with capacity (at least 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
        }
    }

    /// Look up a result
    ///
    /// A hit increments `hit_count` and moves the entry to the most recently
    /// used position.
    pub fn get(&self, prompt: &str, model: &str) -> Option<CacheEntry> {
        let key = cache_key(prompt, model);
        let mut entries = self.entries.lock();

        let mut entry = entries.shift_remove(&key)?;
        entry.hit_count = entry.hit_count.saturating_add(1);
        entries.insert(key, entry.clone());

        tracing::debug!(key = %entry.key, hits = entry.hit_count, "Cache hit");
        Some(entry)
    }

    /// Insert a result at the most recently used position
    ///
    /// Evicts exactly the least recently used entry when a new key arrives
    /// at capacity. Re-inserting an existing key replaces it.
    pub fn set(
        &self,
        prompt: &str,
        model: &str,
        code: impl Into<String>,
        interactivity: InteractivityAssessment,
    ) {
        let key = cache_key(prompt, model);
        let entry = CacheEntry {
            key: key.clone(),
            code: code.into(),
            interactivity,
            model: model.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            hit_count: 0,
        };

        let mut entries = self.entries.lock();
        if entries.shift_remove(&key).is_none() && entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                tracing::debug!(key = %evicted, "Evicted least recently used entry");
            }
        }
        entries.insert(key, entry);
    }

    /// Remove the entry for a `(prompt, model)` pair
    pub fn remove(&self, prompt: &str, model: &str) -> Option<CacheEntry> {
        self.entries.lock().shift_remove(&cache_key(prompt, model))
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
        tracing::debug!("Cache cleared");
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Capacity
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inspection snapshot with display-truncated keys
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            size: entries.len(),
            max_size: self.capacity,
            entries: entries
                .values()
                .map(|e| CacheEntryStats {
                    key: truncate_key(&e.key),
                    model: e.model.clone(),
                    hit_count: e.hit_count,
                    interactivity_level: e.interactivity.level,
                    timestamp: e.timestamp_ms,
                })
                .collect(),
        }
    }
}

impl Default for ResultCache {
    /// Create cache with default capacity (50 entries)
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn truncate_key(key: &str) -> String {
    if key.chars().count() <= KEY_DISPLAY_LEN {
        return key.to_string();
    }
    let mut out: String = key.chars().take(KEY_DISPLAY_LEN).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assessment() -> InteractivityAssessment {
        InteractivityAssessment {
            level: InteractivityLevel::Interactive,
            score: 94,
            has_hooks: true,
            has_event_handlers: true,
            has_controlled_inputs: true,
            missing_patterns: vec![],
            suggestions: vec![],
        }
    }

    #[test]
    fn set_then_get() {
        let cache = ResultCache::new(10);
        cache.set("Create a button", "m", "code", assessment());

        let entry = cache.get("Create a button", "m").unwrap();
        assert_eq!(entry.code, "code");
        assert_eq!(entry.hit_count, 1);
        assert_eq!(cache.get("Create a button", "m").unwrap().hit_count, 2);
    }

    #[test]
    fn model_is_part_of_the_key() {
        let cache = ResultCache::new(10);
        cache.set("p", "model-a", "a", assessment());
        assert!(cache.get("p", "model-b").is_none());
    }

    #[test]
    fn evicts_exactly_the_lru_entry() {
        let cache = ResultCache::new(3);
        cache.set("a", "m", "1", assessment());
        cache.set("b", "m", "2", assessment());
        cache.set("c", "m", "3", assessment());

        // Touch "a" so "b" becomes least recently used
        assert!(cache.get("a", "m").is_some());
        cache.set("d", "m", "4", assessment());

        assert_eq!(cache.len(), 3);
        assert!(cache.get("b", "m").is_none());
        assert!(cache.get("a", "m").is_some());
        assert!(cache.get("c", "m").is_some());
        assert!(cache.get("d", "m").is_some());
    }

    #[test]
    fn fifty_first_insert_evicts_one() {
        let cache = ResultCache::default();
        for i in 0..DEFAULT_CAPACITY {
            cache.set(&format!("prompt {i}"), "m", "x", assessment());
        }
        assert_eq!(cache.len(), 50);

        cache.set("prompt 50", "m", "x", assessment());
        assert_eq!(cache.len(), 50);
        assert!(cache.get("prompt 0", "m").is_none());
        assert!(cache.get("prompt 1", "m").is_some());
    }

    #[test]
    fn reinsert_replaces_without_eviction() {
        let cache = ResultCache::new(2);
        cache.set("a", "m", "1", assessment());
        cache.set("b", "m", "2", assessment());
        cache.get("a", "m");
        cache.set("a", "m", "new", assessment());

        assert_eq!(cache.len(), 2);
        let entry = cache.get("a", "m").unwrap();
        assert_eq!(entry.code, "new");
        assert_eq!(entry.hit_count, 1);
    }

    #[test]
    fn remove_and_clear() {
        let cache = ResultCache::new(5);
        cache.set("a", "m", "1", assessment());
        cache.set("b", "m", "2", assessment());

        assert!(cache.remove("A ", "m").is_some());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn stats_truncate_long_keys() {
        let cache = ResultCache::new(5);
        let long_prompt = "build a dashboard with charts, filters and a settings drawer";
        cache.set(long_prompt, "m", "x", assessment());

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.max_size, 5);
        let key = &stats.entries[0].key;
        assert!(key.ends_with("..."));
        assert_eq!(key.chars().count(), 53);
        assert_eq!(stats.entries[0].interactivity_level, InteractivityLevel::Interactive);
    }

    #[test]
    fn stats_serialize() {
        let cache = ResultCache::new(5);
        cache.set("a", "m", "1", assessment());
        let json = serde_json::to_value(cache.stats()).unwrap();
        assert_eq!(json["entries"][0]["interactivity_level"], "interactive");
    }

    proptest! {
        #[test]
        fn normalization_ignores_case_and_outer_whitespace(
            prompt in "[a-zA-Z][a-zA-Z ]{0,30}[a-zA-Z]",
            lead in "[ \t]{0,3}",
            trail in "[ \t]{0,3}",
        ) {
            let variant = format!("{lead}{}{trail}\n", prompt.to_uppercase());
            prop_assert_eq!(cache_key(&prompt, "m"), cache_key(&variant, "m"));
        }
    }
}
