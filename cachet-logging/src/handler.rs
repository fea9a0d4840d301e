use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{LevelFilter, Record};
use parking_lot::{Mutex, RwLock};

use crate::error::{LoggingError, Result};
use crate::Formatter;

/// Kind of a handler, used to find or replace handlers on a logger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    Console,
    WatchedFile,
}

/// A destination for formatted log records.
///
/// Level and formatter live behind interior locks so a handler can be
/// reconfigured while the logger keeps using it.
pub trait Handler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    fn level(&self) -> LevelFilter;

    fn set_level(&self, level: LevelFilter);

    fn formatter(&self) -> Formatter;

    fn set_formatter(&self, formatter: Formatter);

    /// Formats and writes `record` if it passes this handler's level.
    fn handle(&self, record: &Record<'_>) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;
}

struct HandlerSettings {
    level: RwLock<LevelFilter>,
    formatter: RwLock<Formatter>,
}

impl HandlerSettings {
    fn new(level: LevelFilter, formatter: Formatter) -> Self {
        Self {
            level: RwLock::new(level),
            formatter: RwLock::new(formatter),
        }
    }

    fn accepts(&self, record: &Record<'_>) -> bool {
        record.level() <= *self.level.read()
    }

    fn line(&self, record: &Record<'_>) -> String {
        let mut line = self.formatter.read().format(record);
        line.push('\n');
        line
    }
}

/// Writes records to standard error.
///
/// On unix the handler holds its own duplicate of file descriptor 2, taken
/// when it is created. Redirecting standard error into the logger afterwards
/// therefore does not feed the handler's output back into itself.
pub struct ConsoleHandler {
    settings: HandlerSettings,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleHandler {
    pub fn new(level: LevelFilter, formatter: Formatter) -> Self {
        Self::with_writer(level, formatter, original_stderr())
    }

    /// Creates a console handler writing to an arbitrary sink.
    pub fn with_writer(
        level: LevelFilter,
        formatter: Formatter,
        writer: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            settings: HandlerSettings::new(level, formatter),
            out: Mutex::new(writer),
        }
    }
}

#[cfg(unix)]
fn original_stderr() -> Box<dyn Write + Send> {
    use std::os::fd::AsFd;

    match io::stderr().as_fd().try_clone_to_owned() {
        Ok(fd) => Box::new(File::from(fd)),
        Err(_) => Box::new(io::stderr()),
    }
}

#[cfg(not(unix))]
fn original_stderr() -> Box<dyn Write + Send> {
    Box::new(io::stderr())
}

impl Handler for ConsoleHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::Console
    }

    fn level(&self) -> LevelFilter {
        *self.settings.level.read()
    }

    fn set_level(&self, level: LevelFilter) {
        *self.settings.level.write() = level;
    }

    fn formatter(&self) -> Formatter {
        self.settings.formatter.read().clone()
    }

    fn set_formatter(&self, formatter: Formatter) {
        *self.settings.formatter.write() = formatter;
    }

    fn handle(&self, record: &Record<'_>) -> io::Result<()> {
        if !self.settings.accepts(record) {
            return Ok(());
        }
        let line = self.settings.line(record);
        let mut out = self.out.lock();
        out.write_all(line.as_bytes())?;
        out.flush()
    }

    fn flush(&self) -> io::Result<()> {
        self.out.lock().flush()
    }
}

struct OpenLog {
    file: File,
    #[cfg(unix)]
    identity: (u64, u64),
}

/// Appends records to a file and reopens it when it is moved or removed.
///
/// Before each write the path is checked: if the file no longer exists, or
/// (on unix) its device/inode pair differs from the open file's, the file
/// is reopened at the path. This cooperates with external log rotation.
pub struct WatchedFileHandler {
    settings: HandlerSettings,
    path: PathBuf,
    open: Mutex<Option<OpenLog>>,
}

impl WatchedFileHandler {
    /// Opens (creating if needed) `path` for appending.
    ///
    /// The parent directory must exist; [`configure_stream`] creates it.
    ///
    /// [`configure_stream`]: crate::configure_stream
    pub fn new(path: impl Into<PathBuf>, level: LevelFilter, formatter: Formatter) -> Result<Self> {
        let path = path.into();
        let open = open_log(&path).map_err(|e| LoggingError::io(&path, e))?;
        Ok(Self {
            settings: HandlerSettings::new(level, formatter),
            path,
            open: Mutex::new(Some(open)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_log(path: &Path) -> io::Result<OpenLog> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let meta = file.metadata()?;
        Ok(OpenLog {
            file,
            identity: (meta.dev(), meta.ino()),
        })
    }
    #[cfg(not(unix))]
    {
        Ok(OpenLog { file })
    }
}

fn still_current(open: &OpenLog, path: &Path) -> bool {
    match fs::metadata(path) {
        #[cfg(unix)]
        Ok(meta) => {
            use std::os::unix::fs::MetadataExt;
            (meta.dev(), meta.ino()) == open.identity
        }
        #[cfg(not(unix))]
        Ok(_) => {
            let _ = open;
            true
        }
        Err(_) => false,
    }
}

impl Handler for WatchedFileHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::WatchedFile
    }

    fn level(&self) -> LevelFilter {
        *self.settings.level.read()
    }

    fn set_level(&self, level: LevelFilter) {
        *self.settings.level.write() = level;
    }

    fn formatter(&self) -> Formatter {
        self.settings.formatter.read().clone()
    }

    fn set_formatter(&self, formatter: Formatter) {
        *self.settings.formatter.write() = formatter;
    }

    fn handle(&self, record: &Record<'_>) -> io::Result<()> {
        if !self.settings.accepts(record) {
            return Ok(());
        }
        let line = self.settings.line(record);

        let mut open = self.open.lock();
        let reopen = match open.as_ref() {
            Some(current) => !still_current(current, &self.path),
            None => true,
        };
        if reopen {
            *open = None;
            *open = Some(open_log(&self.path)?);
        }

        match open.as_mut() {
            Some(current) => current.file.write_all(line.as_bytes()),
            None => Ok(()),
        }
    }

    fn flush(&self) -> io::Result<()> {
        match self.open.lock().as_mut() {
            Some(current) => current.file.flush(),
            None => Ok(()),
        }
    }
}
