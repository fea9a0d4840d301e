//! # Cachet Logging
//!
//! Logging setup for long-running processes built on the [`log`] facade.
//!
//! A single process-wide logger named `runtime` carries a console handler
//! and, optionally, a file handler that survives external log rotation.
//! Output written to the process's standard output and standard error is
//! captured into the same logger unless the configuration opts out.
//!
//! ## Quick start
//!
//! ```no_run
//! use cachet_logging::{configure_stream, setup_logging, LoggingConfig};
//! use log::LevelFilter;
//!
//! let logger = setup_logging(&LoggingConfig::default().with_level(LevelFilter::Debug))?;
//! configure_stream(logger, "logs/app/bot.log")?;
//!
//! log::info!("Fetching market data");
//! # Ok::<(), cachet_logging::LoggingError>(())
//! ```
//!
//! ## Pieces
//!
//! - [`Formatter`] renders records with a `{asctime} - {level} - {message}`
//!   style pattern
//! - [`ConsoleHandler`] and [`WatchedFileHandler`] are the two [`Handler`]s
//! - [`StreamToLogger`] is an `io::Write` sink that logs each line
//! - [`redirect_std_streams`] routes descriptors 1 and 2 into the logger

mod config;
mod error;
mod formatter;
mod handler;
mod logger;
pub mod redirect;
mod stream;

pub use config::LoggingConfig;
pub use error::{LoggingError, Result};
pub use formatter::{Formatter, DEFAULT_DATE_FORMAT, DEFAULT_FORMAT};
pub use handler::{ConsoleHandler, Handler, HandlerKind, WatchedFileHandler};
pub use logger::{
    configure_stream, get_formatter, logger, restore_std_streams, setup_logging, RuntimeLogger,
    RUNTIME_LOGGER_NAME,
};
pub use redirect::{redirect, redirect_std_streams, StdStream, StdStreamRedirect};
pub use stream::StreamToLogger;
