//! Wireforge Result Cache
//!
//! Bounded, strictly LRU cache of validated generation results keyed by
//! `(model, normalized prompt)`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wf_cache::ResultCache;
//!
//! let cache = Arc::new(ResultCache::new(50));
//! cache.set("Create a button", "gpt-4o", code, assessment);
//! assert!(cache.get("  create a BUTTON\n", "gpt-4o").is_some());
//! ```

#![warn(unreachable_pub)]

mod cache;

pub use cache::{cache_key, normalize_prompt, CacheEntry, CacheEntryStats, CacheStats, ResultCache, DEFAULT_CAPACITY};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
