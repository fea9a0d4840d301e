//! Process-wide registry of named cache statistics.
//!
//! Caches generated by the attribute macros register their [`CacheStats`]
//! on first use, under the function name or the `name = "..."` attribute.
//! Registering a name twice replaces the earlier entry.
//!
//! ```
//! use cachet_core::{stats_registry, CacheStats};
//!
//! static STATS: CacheStats = CacheStats::new();
//!
//! stats_registry::register("load_markets", &STATS);
//! STATS.record_miss();
//!
//! let snapshot = stats_registry::get("load_markets").unwrap();
//! assert_eq!(snapshot.misses(), 1);
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::CacheStats;

static STATS_REGISTRY: Lazy<RwLock<HashMap<String, &'static CacheStats>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn register(name: &str, stats: &'static CacheStats) {
    STATS_REGISTRY.write().insert(name.to_string(), stats);
}

/// Returns a snapshot of the counters registered under `name`.
pub fn get(name: &str) -> Option<CacheStats> {
    STATS_REGISTRY.read().get(name).map(|stats| (*stats).clone())
}

/// Returns the live counters registered under `name`.
pub fn get_ref(name: &str) -> Option<&'static CacheStats> {
    STATS_REGISTRY.read().get(name).copied()
}

pub fn list() -> Vec<String> {
    STATS_REGISTRY.read().keys().cloned().collect()
}

/// Resets the counters registered under `name`; `false` if none are.
pub fn reset(name: &str) -> bool {
    match STATS_REGISTRY.read().get(name) {
        Some(stats) => {
            stats.reset();
            true
        }
        None => false,
    }
}

/// Removes every registration. The counters themselves are untouched.
pub fn clear() {
    STATS_REGISTRY.write().clear();
}
