/// Integration tests for logging setup through the global `log` facade

#[cfg(test)]
mod tests {
    use cachet::logging::{
        configure_stream, get_formatter, logger, setup_logging, HandlerKind, LoggingConfig,
        LoggingError, DEFAULT_FORMAT,
    };
    use log::{LevelFilter, Log};
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    // Redirecting the standard streams would swallow the test harness output
    fn base_config() -> LoggingConfig {
        LoggingConfig::default().with_redirect(false)
    }

    fn quiet_config() -> LoggingConfig {
        LoggingConfig {
            format: "{level} - {message}".to_string(),
            ..base_config()
        }
    }

    #[test]
    #[serial]
    fn test_setup_logging_installs_runtime_logger() {
        let logger = setup_logging(&base_config()).unwrap();

        assert_eq!(logger.name(), "runtime");
        assert_eq!(logger.level(), LevelFilter::Info);
        assert_eq!(log::max_level(), LevelFilter::Info);
        assert_eq!(logger.handler_count(HandlerKind::Console), 1);
    }

    #[test]
    #[serial]
    fn test_setup_logging_twice_keeps_one_console_handler() {
        setup_logging(&base_config()).unwrap();
        let logger = setup_logging(&quiet_config().with_level(LevelFilter::Debug)).unwrap();

        assert_eq!(logger.handler_count(HandlerKind::Console), 1);
        assert_eq!(logger.level(), LevelFilter::Debug);
        assert_eq!(
            get_formatter(logger, HandlerKind::Console).unwrap().pattern(),
            "{level} - {message}"
        );
    }

    #[test]
    #[serial]
    fn test_get_formatter_defaults() {
        let logger = setup_logging(&base_config()).unwrap();
        let formatter = get_formatter(logger, HandlerKind::Console).unwrap();
        assert_eq!(formatter.pattern(), DEFAULT_FORMAT);
        assert_eq!(formatter.date_format(), "%Y-%m-%d %H:%M:%S,%3f");
    }

    #[test]
    #[serial]
    fn test_console_can_be_disabled() {
        let config = LoggingConfig {
            console: false,
            ..base_config()
        };
        let logger = setup_logging(&config).unwrap();
        assert_eq!(logger.handler_count(HandlerKind::Console), 0);
        assert!(get_formatter(logger, HandlerKind::Console).is_none());

        setup_logging(&base_config()).unwrap();
        assert_eq!(logger.handler_count(HandlerKind::Console), 1);
    }

    #[test]
    #[serial]
    fn test_log_file_receives_facade_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("app").join("test.log");
        setup_logging(&quiet_config().with_log_file(&path)).unwrap();

        log::info!("Test message");
        log::debug!("not at info");
        log::error!("Something went wrong!");
        log::logger().flush();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("INFO - Test message"));
        assert!(content.contains("ERROR - Something went wrong!"));
        assert!(!content.contains("not at info"));

        logger().remove_handlers(HandlerKind::WatchedFile);
    }

    #[test]
    #[serial]
    fn test_configure_stream_does_not_duplicate_file_handler() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dup.log");
        let logger = setup_logging(&quiet_config()).unwrap();

        configure_stream(logger, &path).unwrap();
        configure_stream(logger, &path).unwrap();
        assert_eq!(logger.handler_count(HandlerKind::WatchedFile), 1);

        log::warn!("exactly once");
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("exactly once").count(), 1);

        logger.remove_handlers(HandlerKind::WatchedFile);
    }

    #[test]
    #[serial]
    fn test_configure_stream_shares_console_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.log");
        let logger = setup_logging(&quiet_config()).unwrap();

        configure_stream(logger, &path).unwrap();
        assert_eq!(
            get_formatter(logger, HandlerKind::WatchedFile).unwrap(),
            get_formatter(logger, HandlerKind::Console).unwrap()
        );

        logger.remove_handlers(HandlerKind::WatchedFile);
    }

    #[test]
    #[serial]
    fn test_configure_stream_rejects_empty_path() {
        let logger = setup_logging(&base_config()).unwrap();
        let err = configure_stream(logger, "").unwrap_err();
        assert!(matches!(err, LoggingError::EmptyLogPath));
    }

    #[test]
    #[serial]
    fn test_invalid_format_is_rejected() {
        let config = LoggingConfig {
            format: "{asctime} - {unknown}".to_string(),
            ..base_config()
        };
        assert!(matches!(
            setup_logging(&config),
            Err(LoggingError::InvalidFormat { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_config_from_json_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("from_config.log");
        let document = serde_json::json!({
            "level": "warn",
            "format": "{level}|{message}",
            "log_file": path,
            "redirect_std_streams": false,
        });
        let config: LoggingConfig = serde_json::from_value(document).unwrap();

        let logger = setup_logging(&config).unwrap();
        assert_eq!(logger.level(), LevelFilter::Warn);

        log::info!("below threshold");
        log::warn!("configured");
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "WARNING|configured\n");

        logger.remove_handlers(HandlerKind::WatchedFile);
    }
}
