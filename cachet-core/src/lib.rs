//! # Cachet Core
//!
//! Runtime support for the cachet caching attributes.
//!
//! The attribute macros in `cachet-macros` expand to calls into this crate;
//! everything here can also be used directly.
//!
//! ## Features
//!
//! - **Path templates**: Cache directories rendered from an instance's fields
//! - **File caches**: Results persisted as JSON or `bincode`, written atomically
//! - **Call-count caching**: In-memory value recomputed every N calls
//! - **Result-aware caching**: Only `Ok` values are persisted or kept
//! - **Statistics**: Per-cache hit/miss counters (with the `stats` feature)
//!
//! ## Module Organization
//!
//! - [`template`] - `{field}` directory templates
//! - [`format`] - JSON and binary envelopes
//! - [`file_cache`] - Single-slot caches backed by one file
//! - [`call_count`] - Every-Nth-call refresh cache
//! - [`stats_registry`] - Named statistics lookup
//!
pub mod call_count;
pub mod error;
pub mod file_cache;
pub mod format;
pub mod template;

mod stats;

pub mod stats_registry;

pub use call_count::CallCountCache;
pub use error::{CacheError, Result};
pub use file_cache::FileCache;
pub use format::{CacheEnvelope, CacheFormat};
pub use stats::CacheStats;
pub use template::PathTemplate;

/// Re-exports used by macro-generated code. Not part of the public API.
#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}
