//! # Cachet
//!
//! Attribute macros that persist function results to files or keep them in
//! memory for a number of calls, plus a one-shot logging setup for
//! long-running processes.
//!
//! ## Features
//!
//! - **Dynamic file caches**: `#[dynamic_cache_to_json]` and
//!   `#[dynamic_cache_to_binary]` write a method's result into a directory
//!   rendered from the instance's fields
//! - **Fixed file caches**: `#[cache_to_json]` and `#[cache_to_binary]`
//!   write to one path
//! - **Call-count caching**: `#[cache_for_n_calls(n)]` recomputes every `n`
//!   calls
//! - **Result-aware**: only `Ok` values are cached
//! - **Logging**: console and rotation-friendly file handlers, and capture of
//!   stdout/stderr, through the [`log`] facade
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cachet::dynamic_cache_to_json;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Clone, Debug)]
//! struct ExchangeInfo {
//!     symbols: Vec<String>,
//! }
//!
//! #[derive(Serialize)]
//! struct Connector {
//!     exchange_name: String,
//!     market_type: String,
//! }
//!
//! impl Connector {
//!     #[dynamic_cache_to_json("cache/{exchange_name}/{market_type}/")]
//!     fn exchange_info(&self) -> ExchangeInfo {
//!         // Expensive request; runs once, then is read from
//!         // cache/binance/spot/exchange_info.json
//!         ExchangeInfo { symbols: vec!["BTCUSDT".into()] }
//!     }
//! }
//!
//! let connector = Connector {
//!     exchange_name: "binance".into(),
//!     market_type: "spot".into(),
//! };
//! let first = connector.exchange_info();
//! let second = connector.exchange_info();
//! assert_eq!(first.symbols, second.symbols);
//! ```
//!
//! ## Caching for N Calls
//!
//! ```rust
//! use cachet::cache_for_n_calls;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! static CALLS: AtomicU32 = AtomicU32::new(0);
//!
//! #[cache_for_n_calls(3)]
//! fn balance() -> u32 {
//!     CALLS.fetch_add(1, Ordering::SeqCst) + 1
//! }
//!
//! let seen: Vec<u32> = (0..6).map(|_| balance()).collect();
//! assert_eq!(seen, vec![1, 1, 1, 2, 2, 2]);
//! ```
//!
//! ## Logging
//!
//! ```rust,no_run
//! use cachet::logging::{setup_logging, LoggingConfig};
//!
//! // stdout and stderr are redirected into the log unless
//! // `.with_redirect(false)` is set
//! let config = LoggingConfig::default().with_log_file("logs/bot.log");
//! setup_logging(&config)?;
//!
//! log::info!("bot started");
//! println!("this line ends up in logs/bot.log too");
//! # Ok::<(), cachet::logging::LoggingError>(())
//! ```
//!
//! ## Statistics
//!
//! With the default `stats` feature every cache attribute registers hit and
//! miss counters under its function name (or `name = "..."`):
//!
//! ```rust,ignore
//! if let Some(stats) = cachet::stats_registry::get("exchange_info") {
//!     println!("hit rate: {:.1}%", stats.hit_rate() * 100.0);
//! }
//! ```
//!
//! ## Cache Key
//!
//! File caches are keyed by their path only: one file per rendered
//! directory and function. Arguments of the decorated function do not
//! select between files. Delete the file, or call
//! [`FileCache::invalidate`], to force a recomputation.

pub use cachet_core::*;
#[doc(hidden)]
pub use cachet_core as __core;
pub use cachet_macros::{
    cache_for_n_calls, cache_to_binary, cache_to_json, dynamic_cache_to_binary,
    dynamic_cache_to_json,
};

/// Logging setup; see [`cachet_logging`].
pub use cachet_logging as logging;

pub use cachet_logging::{configure_stream, get_formatter, setup_logging};
