use std::fs;
use std::path::Path;

use log::{LevelFilter, Log, Metadata, Record};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, RwLock};

use crate::error::{LoggingError, Result};
use crate::handler::{ConsoleHandler, Handler, HandlerKind, WatchedFileHandler};
use crate::redirect::{redirect_std_streams, StdStreamRedirect};
use crate::{Formatter, LoggingConfig};

/// Name of the process-wide logger.
pub const RUNTIME_LOGGER_NAME: &str = "runtime";

/// A level filter plus an ordered list of handlers.
///
/// `RuntimeLogger` implements [`log::Log`]; [`setup_logging`] installs the
/// process-wide instance so that `log::info!` and friends reach its
/// handlers. Standalone instances are useful in tests and can be driven
/// directly through the `Log` trait.
pub struct RuntimeLogger {
    name: String,
    level: RwLock<LevelFilter>,
    handlers: RwLock<Vec<Box<dyn Handler>>>,
}

impl RuntimeLogger {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            level: RwLock::new(LevelFilter::Warn),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LevelFilter {
        *self.level.read()
    }

    pub fn set_level(&self, level: LevelFilter) {
        *self.level.write() = level;
    }

    pub fn add_handler(&self, handler: Box<dyn Handler>) {
        self.handlers.write().push(handler);
    }

    /// Removes every handler of `kind` and appends `handler`, atomically.
    pub fn replace_handlers(&self, kind: HandlerKind, handler: Box<dyn Handler>) {
        let mut handlers = self.handlers.write();
        handlers.retain(|h| h.kind() != kind);
        handlers.push(handler);
    }

    /// Removes every handler of `kind`, returning how many were removed.
    pub fn remove_handlers(&self, kind: HandlerKind) -> usize {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|h| h.kind() != kind);
        before - handlers.len()
    }

    pub fn clear_handlers(&self) {
        self.handlers.write().clear();
    }

    /// Kinds of the installed handlers, in order.
    pub fn handler_kinds(&self) -> Vec<HandlerKind> {
        self.handlers.read().iter().map(|h| h.kind()).collect()
    }

    pub fn handler_count(&self, kind: HandlerKind) -> usize {
        self.handlers
            .read()
            .iter()
            .filter(|h| h.kind() == kind)
            .count()
    }

    /// Runs `f` on the first handler of `kind`, if any.
    pub fn with_handler<T>(&self, kind: HandlerKind, f: impl FnOnce(&dyn Handler) -> T) -> Option<T> {
        self.handlers
            .read()
            .iter()
            .find(|h| h.kind() == kind)
            .map(|h| f(h.as_ref()))
    }
}

impl Log for RuntimeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        for handler in self.handlers.read().iter() {
            // A failing handler must not stop the others, and reporting the
            // failure through the logger would recurse
            let _ = handler.handle(record);
        }
    }

    fn flush(&self) {
        for handler in self.handlers.read().iter() {
            let _ = handler.flush();
        }
    }
}

static LOGGER: Lazy<RuntimeLogger> = Lazy::new(|| RuntimeLogger::new(RUNTIME_LOGGER_NAME));
static INSTALLED: OnceCell<()> = OnceCell::new();
static REDIRECT: Mutex<Option<StdStreamRedirect>> = parking_lot::const_mutex(None);

/// The process-wide `runtime` logger.
///
/// It has no handlers until [`setup_logging`] runs.
pub fn logger() -> &'static RuntimeLogger {
    &LOGGER
}

/// Configures the process-wide `runtime` logger and installs it as the
/// `log` facade's logger.
///
/// - Sets the logger level (and `log::max_level`) to `config.level`.
/// - With `config.console`, ensures exactly one console handler at that
///   level using `config.format`. Without it, removes console handlers.
/// - With `config.log_file`, applies [`configure_stream`].
/// - Redirects stdout at `Info` and stderr at `Error` into the logger until
///   [`restore_std_streams`] is called. Set `config.redirect_std_streams`
///   to `false` to leave the streams alone.
///
/// Calling it again reconfigures the same logger. The existing console
/// handler is reused so that it keeps writing to the original standard
/// error even while redirection is active.
///
/// # Errors
///
/// - [`LoggingError::LoggerAlreadySet`] if another `log` implementation
///   was installed first
/// - [`LoggingError::InvalidFormat`] for a bad `config.format`
/// - Errors from [`configure_stream`] and stream redirection
///
/// # Examples
///
/// ```no_run
/// use cachet_logging::{setup_logging, LoggingConfig};
/// use log::LevelFilter;
///
/// let config = LoggingConfig::default()
///     .with_level(LevelFilter::Debug)
///     .with_log_file("logs/bot.log");
/// let logger = setup_logging(&config)?;
///
/// log::info!("bot started");
/// assert_eq!(logger.name(), "runtime");
/// # Ok::<(), cachet_logging::LoggingError>(())
/// ```
pub fn setup_logging(config: &LoggingConfig) -> Result<&'static RuntimeLogger> {
    let formatter = Formatter::new(&config.format)?;
    let logger = logger();

    INSTALLED.get_or_try_init(|| {
        log::set_logger(logger).map_err(|_| LoggingError::LoggerAlreadySet)
    })?;

    logger.set_level(config.level);
    log::set_max_level(config.level);

    if config.console {
        let reused = logger.with_handler(HandlerKind::Console, |h| {
            h.set_level(config.level);
            h.set_formatter(formatter.clone());
        });
        if reused.is_none() {
            logger.add_handler(Box::new(ConsoleHandler::new(config.level, formatter)));
        }
    } else {
        logger.remove_handlers(HandlerKind::Console);
    }

    if let Some(path) = &config.log_file {
        configure_stream(logger, path)?;
    }

    if config.redirect_std_streams {
        let mut active = REDIRECT.lock();
        if active.is_none() {
            *active = Some(redirect_std_streams()?);
        }
    }

    Ok(logger)
}

/// Ends the redirection started by [`setup_logging`], if any.
///
/// Returns `Ok(true)` if streams were restored.
pub fn restore_std_streams() -> Result<bool> {
    let guard = REDIRECT.lock().take();
    match guard {
        Some(guard) => guard.restore().map(|_| true),
        None => Ok(false),
    }
}

/// Returns the formatter of the first handler of `kind` on `logger`.
pub fn get_formatter(logger: &RuntimeLogger, kind: HandlerKind) -> Option<Formatter> {
    logger.with_handler(kind, |h| h.formatter())
}

/// Adds file logging to `logger`.
///
/// Creates the parent directories of `log_file`, then replaces any existing
/// watched file handler with a new one at `Info`. The new handler uses the
/// console handler's formatter, or the default formatter when the logger
/// has no console handler.
///
/// # Errors
///
/// [`LoggingError::EmptyLogPath`] for an empty path, [`LoggingError::Io`]
/// if the directory or file cannot be created.
pub fn configure_stream(logger: &RuntimeLogger, log_file: impl AsRef<Path>) -> Result<()> {
    let log_file = log_file.as_ref();
    if log_file.as_os_str().is_empty() {
        return Err(LoggingError::EmptyLogPath);
    }

    if let Some(dir) = log_file.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|e| LoggingError::io(dir, e))?;
        }
    }

    let formatter = get_formatter(logger, HandlerKind::Console).unwrap_or_default();
    let handler = WatchedFileHandler::new(log_file, LevelFilter::Info, formatter)?;
    logger.replace_handlers(HandlerKind::WatchedFile, Box::new(handler));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use tempfile::tempdir;

    fn log_at(logger: &RuntimeLogger, level: Level, message: &str) {
        logger.log(
            &Record::builder()
                .args(format_args!("{}", message))
                .level(level)
                .target("runtime")
                .build(),
        );
        logger.flush();
    }

    fn file_logger() -> RuntimeLogger {
        let logger = RuntimeLogger::new("test");
        logger.set_level(LevelFilter::Info);
        logger
    }

    #[test]
    fn test_new_logger_has_no_handlers() {
        let logger = RuntimeLogger::new("runtime");
        assert_eq!(logger.name(), "runtime");
        assert!(logger.handler_kinds().is_empty());
        assert!(get_formatter(&logger, HandlerKind::Console).is_none());
    }

    #[test]
    fn test_configure_stream_writes_messages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");
        let logger = file_logger();

        configure_stream(&logger, &path).unwrap();
        assert_eq!(logger.handler_count(HandlerKind::WatchedFile), 1);

        log_at(&logger, Level::Info, "Test message");
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Test message"));
        assert!(content.contains(" - INFO - "));
    }

    #[test]
    fn test_configure_stream_creates_nested_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("app").join("test.log");
        let logger = file_logger();

        configure_stream(&logger, &path).unwrap();
        assert!(path.parent().unwrap().is_dir());

        log_at(&logger, Level::Warn, "Nested test message");
        assert!(path.is_file());
    }

    #[test]
    fn test_configure_stream_empty_path() {
        let logger = file_logger();
        let err = configure_stream(&logger, "").unwrap_err();
        assert!(matches!(err, LoggingError::EmptyLogPath));
        assert_eq!(err.to_string(), "log file path cannot be empty");
    }

    #[test]
    fn test_configure_stream_replaces_file_handler() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");
        let logger = file_logger();

        configure_stream(&logger, &first).unwrap();
        configure_stream(&logger, &first).unwrap();
        assert_eq!(logger.handler_count(HandlerKind::WatchedFile), 1);

        configure_stream(&logger, &second).unwrap();
        assert_eq!(logger.handler_count(HandlerKind::WatchedFile), 1);

        log_at(&logger, Level::Info, "only in second");
        assert!(!fs::read_to_string(&first).unwrap().contains("only in second"));
        assert!(fs::read_to_string(&second).unwrap().contains("only in second"));
    }

    #[test]
    fn test_file_handler_uses_console_formatter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fmt.log");
        let logger = file_logger();
        logger.add_handler(Box::new(ConsoleHandler::with_writer(
            LevelFilter::Info,
            Formatter::new("<{level}> {message}").unwrap(),
            Box::new(std::io::sink()),
        )));

        configure_stream(&logger, &path).unwrap();
        assert_eq!(
            get_formatter(&logger, HandlerKind::WatchedFile)
                .unwrap()
                .pattern(),
            "<{level}> {message}"
        );

        log_at(&logger, Level::Info, "formatted");
        assert_eq!(fs::read_to_string(&path).unwrap(), "<INFO> formatted\n");
    }

    #[test]
    fn test_logger_level_filters_before_handlers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("error.log");
        let logger = file_logger();
        logger.set_level(LevelFilter::Error);
        configure_stream(&logger, &path).unwrap();

        log_at(&logger, Level::Warn, "filtered out");
        log_at(&logger, Level::Error, "Something went wrong!");

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("filtered out"));
        assert!(content.contains("Something went wrong!"));
    }

    #[test]
    fn test_file_handler_stays_at_info() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let logger = file_logger();
        logger.set_level(LevelFilter::Trace);
        configure_stream(&logger, &path).unwrap();

        log_at(&logger, Level::Debug, "debug detail");
        log_at(&logger, Level::Info, "info line");

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("debug detail"));
        assert!(content.contains("info line"));
    }

    #[test]
    fn test_remove_handlers() {
        let logger = file_logger();
        logger.add_handler(Box::new(ConsoleHandler::with_writer(
            LevelFilter::Info,
            Formatter::default(),
            Box::new(std::io::sink()),
        )));
        assert_eq!(logger.remove_handlers(HandlerKind::Console), 1);
        assert_eq!(logger.remove_handlers(HandlerKind::Console), 0);
    }
}
