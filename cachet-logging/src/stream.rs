use std::cell::Cell;
use std::io::{self, Write};

use log::{Level, Log, Record};

thread_local! {
    static IN_WRITE: Cell<bool> = Cell::new(false);
}

/// Clears the reentrancy flag when a write finishes, even on panic.
struct WriteGuard;

impl WriteGuard {
    fn enter() -> Option<Self> {
        IN_WRITE.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(WriteGuard)
            }
        })
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        IN_WRITE.with(|flag| flag.set(false));
    }
}

/// An [`io::Write`] sink that turns text into log records.
///
/// Bytes are buffered until a newline; each complete line is logged at the
/// configured level with trailing whitespace removed. Blank lines are
/// skipped. A trailing partial line is logged on [`flush`](Write::flush)
/// or when the sink is dropped.
///
/// Writes made while another `StreamToLogger` write is in progress on the
/// same thread are discarded. That breaks the loop a logger would otherwise
/// enter if one of its handlers wrote back into a stream-to-logger sink.
///
/// # Examples
///
/// ```
/// use cachet_logging::StreamToLogger;
/// use log::Level;
/// use std::io::Write;
///
/// let mut sink = StreamToLogger::new(log::logger(), Level::Info);
/// writeln!(sink, "connected to exchange").unwrap();
/// ```
pub struct StreamToLogger<'a> {
    logger: &'a dyn Log,
    level: Level,
    target: String,
    buffer: Vec<u8>,
}

impl<'a> StreamToLogger<'a> {
    pub fn new(logger: &'a dyn Log, level: Level) -> Self {
        Self {
            logger,
            level,
            target: "runtime".to_string(),
            buffer: Vec::new(),
        }
    }

    /// Sets the target attached to emitted records. Default: `runtime`.
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns true while a write is in progress on the current thread.
    pub fn in_write() -> bool {
        IN_WRITE.with(Cell::get)
    }

    fn emit(&self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end();
        if line.trim_start().is_empty() {
            return;
        }
        self.logger.log(
            &Record::builder()
                .args(format_args!("{}", line))
                .level(self.level)
                .target(&self.target)
                .build(),
        );
    }

    fn emit_complete_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.emit(&line);
        }
    }

    fn emit_pending(&mut self) {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.emit(&rest);
        }
    }
}

impl Write for StreamToLogger<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(_guard) = WriteGuard::enter() else {
            return Ok(buf.len());
        };
        self.buffer.extend_from_slice(buf);
        self.emit_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let Some(_guard) = WriteGuard::enter() else {
            return Ok(());
        };
        self.emit_pending();
        self.logger.flush();
        Ok(())
    }
}

impl Drop for StreamToLogger<'_> {
    fn drop(&mut self) {
        if let Some(_guard) = WriteGuard::enter() {
            self.emit_pending();
        }
    }
}
