use std::path::PathBuf;

use log::LevelFilter;
use serde::Deserialize;

use crate::formatter::DEFAULT_FORMAT;

/// Settings for [`setup_logging`](crate::setup_logging).
///
/// Deserializable so it can sit inside an application's own configuration
/// file; every field has a default.
///
/// ```
/// use cachet_logging::LoggingConfig;
/// use log::LevelFilter;
///
/// let config: LoggingConfig = serde_json::from_str(r#"{
///     "level": "debug",
///     "log_file": "logs/bot.log"
/// }"#).unwrap();
///
/// assert_eq!(config.level, LevelFilter::Debug);
/// assert!(config.console);
/// assert!(config.redirect_std_streams);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logger level; also the console handler's level.
    pub level: LevelFilter,
    /// Pattern shared by the console and file handlers.
    pub format: String,
    /// Install a console handler writing to standard error.
    pub console: bool,
    /// Route stdout (at `Info`) and stderr (at `Error`) into the logger.
    /// On by default; set to `false` to leave the streams alone.
    pub redirect_std_streams: bool,
    /// Also log to this file through a watched file handler.
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_redirect(mut self, redirect: bool) -> Self {
        self.redirect_std_streams = redirect;
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            format: DEFAULT_FORMAT.to_string(),
            console: true,
            redirect_std_streams: true,
            log_file: None,
        }
    }
}
