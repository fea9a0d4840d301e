//! Redirection of the process's standard output and standard error into the
//! `log` facade.
//!
//! Redirection works at the file descriptor level: descriptors 1 and 2 are
//! replaced by the write ends of pipes, and one reader thread per pipe feeds
//! a [`StreamToLogger`](crate::StreamToLogger). Everything written to the descriptors is captured,
//! `println!` as well as output from C libraries.
//!
//! The returned [`StdStreamRedirect`] restores the original descriptors when
//! dropped, after which the reader threads drain their pipes and exit.

use log::Level;

use crate::error::Result;

/// One standard stream to capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

impl StdStream {
    pub fn name(&self) -> &'static str {
        match self {
            StdStream::Stdout => "stdout",
            StdStream::Stderr => "stderr",
        }
    }

    /// Level captured lines are logged at: `Info` for stdout, `Error` for stderr.
    pub fn default_level(&self) -> Level {
        match self {
            StdStream::Stdout => Level::Info,
            StdStream::Stderr => Level::Error,
        }
    }
}

/// Guard for active redirections; dropping it restores the streams.
pub struct StdStreamRedirect {
    streams: Vec<imp::Redirected>,
}

impl StdStreamRedirect {
    /// Streams currently redirected by this guard.
    pub fn streams(&self) -> Vec<StdStream> {
        self.streams.iter().map(|s| s.stream).collect()
    }

    /// Restores the original descriptors and waits for the reader threads.
    pub fn restore(mut self) -> Result<()> {
        let mut first_error = None;
        for stream in self.streams.drain(..).rev() {
            if let Err(err) = stream.restore() {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for StdStreamRedirect {
    fn drop(&mut self) {
        for stream in self.streams.drain(..).rev() {
            let _ = stream.restore();
        }
    }
}

/// Redirects stdout at `Info` and stderr at `Error`.
pub fn redirect_std_streams() -> Result<StdStreamRedirect> {
    redirect(&[
        (StdStream::Stdout, StdStream::Stdout.default_level()),
        (StdStream::Stderr, StdStream::Stderr.default_level()),
    ])
}

/// Redirects the given streams, each at its own level.
///
/// If one redirection fails, those already made are restored before the
/// error is returned.
pub fn redirect(streams: &[(StdStream, Level)]) -> Result<StdStreamRedirect> {
    let mut guard = StdStreamRedirect {
        streams: Vec::with_capacity(streams.len()),
    };
    for &(stream, level) in streams {
        // On error `guard` is dropped here, undoing the earlier streams
        guard.streams.push(imp::Redirected::start(stream, level)?);
    }
    Ok(guard)
}

#[cfg(unix)]
mod imp {
    use std::fs::File;
    use std::io::{self, Write};
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
    use std::thread::{self, JoinHandle};

    use log::Level;

    use super::StdStream;
    use crate::error::{LoggingError, Result};
    use crate::StreamToLogger;

    pub(super) struct Redirected {
        pub(super) stream: StdStream,
        fd: RawFd,
        saved: OwnedFd,
        reader: Option<JoinHandle<()>>,
    }

    fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
        if ret == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret)
        }
    }

    fn flush_std(stream: StdStream) {
        let _ = match stream {
            StdStream::Stdout => io::stdout().flush(),
            StdStream::Stderr => io::stderr().flush(),
        };
    }

    impl Redirected {
        pub(super) fn start(stream: StdStream, level: Level) -> Result<Self> {
            let fd = match stream {
                StdStream::Stdout => libc::STDOUT_FILENO,
                StdStream::Stderr => libc::STDERR_FILENO,
            };
            let wrap = |source| LoggingError::Redirect {
                stream: stream.name(),
                source,
            };

            flush_std(stream);

            // SAFETY: `fd` is a standard descriptor; ownership of the
            // duplicates and pipe ends is taken immediately after each call.
            let saved = unsafe { OwnedFd::from_raw_fd(cvt(libc::dup(fd)).map_err(wrap)?) };

            let mut ends = [0 as libc::c_int; 2];
            cvt(unsafe { libc::pipe(ends.as_mut_ptr()) }).map_err(wrap)?;
            let read_end = unsafe { File::from_raw_fd(ends[0]) };
            let write_end = unsafe { OwnedFd::from_raw_fd(ends[1]) };

            cvt(unsafe { libc::fcntl(read_end.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) })
                .map_err(wrap)?;
            cvt(unsafe { libc::dup2(write_end.as_raw_fd(), fd) }).map_err(wrap)?;
            // `fd` now refers to the pipe; the extra write end closes here
            drop(write_end);

            let target = stream.name();
            let reader = thread::Builder::new()
                .name(format!("cachet-{}", target))
                .spawn(move || {
                    let mut read_end = read_end;
                    let mut sink = StreamToLogger::new(log::logger(), level).with_target(target);
                    let _ = io::copy(&mut read_end, &mut sink);
                    let _ = sink.flush();
                });

            let reader = match reader {
                Ok(handle) => handle,
                Err(err) => {
                    let _ = cvt(unsafe { libc::dup2(saved.as_raw_fd(), fd) });
                    return Err(wrap(err));
                }
            };

            Ok(Self {
                stream,
                fd,
                saved,
                reader: Some(reader),
            })
        }

        pub(super) fn restore(mut self) -> Result<()> {
            flush_std(self.stream);
            // Replacing `fd` closes the last write end of the pipe, so the
            // reader sees end-of-file once it has drained what was written
            let restored = cvt(unsafe { libc::dup2(self.saved.as_raw_fd(), self.fd) });
            if let Some(reader) = self.reader.take() {
                if restored.is_ok() {
                    let _ = reader.join();
                }
            }
            restored.map(|_| ()).map_err(|source| LoggingError::Redirect {
                stream: self.stream.name(),
                source,
            })
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use log::Level;

    use super::StdStream;
    use crate::error::{LoggingError, Result};

    pub(super) struct Redirected {
        pub(super) stream: StdStream,
    }

    impl Redirected {
        pub(super) fn start(_stream: StdStream, _level: Level) -> Result<Self> {
            Err(LoggingError::Unsupported("standard stream redirection"))
        }

        pub(super) fn restore(self) -> Result<()> {
            Ok(())
        }
    }
}
