use std::fmt::Write as _;

use chrono::{DateTime, Local};
use log::{Level, Record};

use crate::error::{LoggingError, Result};

/// Format of every handler unless configured otherwise.
pub const DEFAULT_FORMAT: &str = "{asctime} - {level} - {message}";

/// `2024-05-01 13:45:10,123`: seconds followed by milliseconds after a comma.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Literal(String),
    AscTime,
    Level,
    Target,
    Message,
}

/// Turns a log record into one line of text.
///
/// The pattern understands `{asctime}`, `{level}`, `{target}` and
/// `{message}`; `{{` and `}}` are literal braces.
///
/// # Examples
///
/// ```
/// use cachet_logging::Formatter;
/// use chrono::{Local, TimeZone};
/// use log::Level;
///
/// let formatter = Formatter::default();
/// let at = Local.with_ymd_and_hms(2024, 5, 1, 13, 45, 10).unwrap();
/// assert_eq!(
///     formatter.render(at, Level::Info, "runtime", "Fetching market data"),
///     "2024-05-01 13:45:10,000 - INFO - Fetching market data"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Formatter {
    pattern: String,
    date_format: String,
    parts: Vec<Part>,
}

impl Formatter {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            parts: parse_pattern(pattern)?,
        })
    }

    /// Replaces the `strftime` format used for `{asctime}`.
    pub fn with_date_format(mut self, date_format: &str) -> Self {
        self.date_format = date_format.to_string();
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Formats `record` with the current local time.
    pub fn format(&self, record: &Record<'_>) -> String {
        let message = record.args().to_string();
        self.render(Local::now(), record.level(), record.target(), &message)
    }

    pub fn render(&self, at: DateTime<Local>, level: Level, target: &str, message: &str) -> String {
        let mut out = String::with_capacity(self.pattern.len() + message.len() + 16);
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::AscTime => {
                    let _ = write!(out, "{}", at.format(&self.date_format));
                }
                Part::Level => out.push_str(level_name(level)),
                Part::Target => out.push_str(target),
                Part::Message => out.push_str(message),
            }
        }
        out
    }
}

/// Level names as they appear in log lines; `Warn` is spelled `WARNING`.
fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            parts: vec![
                Part::AscTime,
                Part::Literal(" - ".to_string()),
                Part::Level,
                Part::Literal(" - ".to_string()),
                Part::Message,
            ],
        }
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Part>> {
    let invalid = |reason: String| LoggingError::InvalidFormat {
        pattern: pattern.to_string(),
        reason,
    };

    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(invalid("unterminated placeholder".to_string()));
                }
                let part = match name.trim() {
                    "asctime" => Part::AscTime,
                    "level" | "levelname" => Part::Level,
                    "target" => Part::Target,
                    "message" => Part::Message,
                    other => return Err(invalid(format!("unknown placeholder `{{{}}}`", other))),
                };
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(part);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => return Err(invalid("single `}` must be escaped as `}}`".to_string())),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_default_matches_parsed_default() {
        assert_eq!(Formatter::new(DEFAULT_FORMAT).unwrap(), Formatter::default());
    }

    #[test]
    fn test_render_default() {
        let line = Formatter::default().render(at(), Level::Error, "runtime", "Something went wrong!");
        assert_eq!(line, "2024-01-02 03:04:05,000 - ERROR - Something went wrong!");
    }

    #[test]
    fn test_custom_pattern_with_target_and_braces() {
        let f = Formatter::new("[{level}] {{{target}}} {message}").unwrap();
        assert_eq!(
            f.render(at(), Level::Warn, "stdout", "hello"),
            "[WARNING] {stdout} hello"
        );
    }

    #[test]
    fn test_level_names() {
        let f = Formatter::new("{level}").unwrap();
        let names: Vec<String> = [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace]
            .into_iter()
            .map(|level| f.render(at(), level, "t", "m"))
            .collect();
        assert_eq!(names, vec!["ERROR", "WARNING", "INFO", "DEBUG", "TRACE"]);
    }

    #[test]
    fn test_custom_date_format() {
        let f = Formatter::new("{asctime}|{message}")
            .unwrap()
            .with_date_format("%H:%M");
        assert_eq!(f.render(at(), Level::Info, "t", "m"), "03:04|m");
    }

    #[test]
    fn test_levelname_alias() {
        let f = Formatter::new("{levelname}").unwrap();
        assert_eq!(f.render(at(), Level::Debug, "t", "m"), "DEBUG");
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(Formatter::new("{asctime").is_err());
        assert!(Formatter::new("{thread} {message}").is_err());
        assert!(Formatter::new("oops }").is_err());
    }
}
