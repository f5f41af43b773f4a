//! Per-thread redirected stdout/stderr.
//!
//! Command code writes to "the current output" through
//! [`current_output_stream`] / [`current_error_stream`] (or the
//! `session_print!` family of macros). Each worker thread gets its own sink,
//! installed by the dispatch layer, so concurrent sessions never see each
//! other's output and no lock is taken on the write path.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::thread::LocalKey;

use tracing::trace;

use super::context::{fatal, thread_label};

/// A byte sink a thread's output can be redirected to.
pub type Sink = Box<dyn Write + Send>;

thread_local! {
    static STDOUT: RefCell<Option<Sink>> = const { RefCell::new(None) };
    static STDERR: RefCell<Option<Sink>> = const { RefCell::new(None) };
}

/// Which standard stream a sink stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    fn slot(self) -> &'static LocalKey<RefCell<Option<Sink>>> {
        match self {
            StreamKind::Stdout => &STDOUT,
            StreamKind::Stderr => &STDERR,
        }
    }

    fn name(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Install `sink` as the calling thread's stream, returning the previous one.
pub fn redirect(kind: StreamKind, sink: Sink) -> Option<Sink> {
    trace!(stream = kind.name(), thread = %thread_label(), "stream redirected");
    kind.slot().with(|cell| cell.borrow_mut().replace(sink))
}

/// Install `sink` as the calling thread's stdout.
pub fn redirect_stdout<W: Write + Send + 'static>(sink: W) -> Option<Sink> {
    redirect(StreamKind::Stdout, Box::new(sink))
}

/// Install `sink` as the calling thread's stderr.
pub fn redirect_stderr<W: Write + Send + 'static>(sink: W) -> Option<Sink> {
    redirect(StreamKind::Stderr, Box::new(sink))
}

/// Remove and return the calling thread's sink.
pub fn take_redirect(kind: StreamKind) -> Option<Sink> {
    kind.slot().with(|cell| cell.borrow_mut().take())
}

pub fn is_redirected(kind: StreamKind) -> bool {
    kind.slot().with(|cell| cell.borrow().is_some())
}

/// Handle to the calling thread's redirected stream.
///
/// Resolves the sink on every write. Not `Send`: it always refers to the
/// thread that created it.
#[derive(Debug)]
pub struct SessionStream {
    kind: StreamKind,
    _thread_bound: PhantomData<*const ()>,
}

impl SessionStream {
    fn resolve(kind: StreamKind) -> Self {
        if !is_redirected(kind) {
            fatal(format_args!(
                "no {} sink installed for thread {}",
                kind.name(),
                thread_label()
            ));
        }
        Self {
            kind,
            _thread_bound: PhantomData,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    fn with_sink<R>(&self, f: impl FnOnce(&mut Sink) -> io::Result<R>) -> io::Result<R> {
        self.kind.slot().with(|cell| match cell.borrow_mut().as_mut() {
            Some(sink) => f(sink),
            None => fatal(format_args!(
                "{} sink for thread {} was removed while in use",
                self.kind.name(),
                thread_label()
            )),
        })
    }
}

impl Write for SessionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_sink(|sink| sink.write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.with_sink(|sink| sink.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with_sink(|sink| sink.flush())
    }
}

impl fmt::Write for SessionStream {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Write::write_all(self, s.as_bytes()).map_err(|_| fmt::Error)
    }
}

/// The calling thread's redirected stdout.
///
/// # Panics
///
/// Panics if no stdout sink is installed on this thread.
pub fn current_output_stream() -> SessionStream {
    SessionStream::resolve(StreamKind::Stdout)
}

/// The calling thread's redirected stderr.
///
/// # Panics
///
/// Panics if no stderr sink is installed on this thread.
pub fn current_error_stream() -> SessionStream {
    SessionStream::resolve(StreamKind::Stderr)
}

/// Backs the `session_print!` family. A failed write is fatal, as with `println!`.
#[doc(hidden)]
pub fn print_to_stream(kind: StreamKind, args: fmt::Arguments<'_>) {
    if let Err(e) = SessionStream::resolve(kind).write_fmt(args) {
        fatal(format_args!(
            "failed printing to session {} on thread {}: {}",
            kind.name(),
            thread_label(),
            e
        ));
    }
}

/// Print to the current session's stdout.
#[macro_export]
macro_rules! session_print {
    ($($arg:tt)*) => {{
        $crate::session::print_to_stream(
            $crate::session::StreamKind::Stdout,
            ::std::format_args!($($arg)*),
        );
    }};
}

/// Print a line to the current session's stdout.
#[macro_export]
macro_rules! session_println {
    () => {
        $crate::session_print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::session_print!("{}\n", ::std::format_args!($($arg)*))
    };
}

/// Print to the current session's stderr.
#[macro_export]
macro_rules! session_eprint {
    ($($arg:tt)*) => {{
        $crate::session::print_to_stream(
            $crate::session::StreamKind::Stderr,
            ::std::format_args!($($arg)*),
        );
    }};
}

/// Print a line to the current session's stderr.
#[macro_export]
macro_rules! session_eprintln {
    () => {
        $crate::session_eprint!("\n")
    };
    ($($arg:tt)*) => {
        $crate::session_eprint!("{}\n", ::std::format_args!($($arg)*))
    };
}

/// Cloneable in-memory sink for capturing a session's output.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Everything written so far, decoded lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut b) = self.inner.lock() {
            b.clear();
        }
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "capture buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Open a sink writing to a duplicate of the descriptor `fd`.
///
/// The original descriptor stays owned by the caller; dropping the sink
/// closes only the duplicate.
#[cfg(unix)]
pub fn fd_sink(fd: std::os::unix::io::RawFd) -> io::Result<std::fs::File> {
    use std::os::unix::io::FromRawFd;

    // SAFETY: dup has no memory-safety preconditions; an invalid fd yields -1.
    let duplicate = unsafe { libc::dup(fd) };
    if duplicate < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `duplicate` is a fresh descriptor owned by nobody else.
    Ok(unsafe { std::fs::File::from_raw_fd(duplicate) })
}
