//! Controlling terminal of a session.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Size of a terminal in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermSize {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub cols: u16,
}

impl TermSize {
    /// Create a new TermSize with the given dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl Default for TermSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> io::Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "terminal device lock poisoned"))
}

/// Terminal device owned by a session.
///
/// Input and output are each behind their own lock, so a command blocked
/// reading input does not stop other writers on the same device.
pub struct TerminalDevice {
    size: Mutex<TermSize>,
    raw_mode: AtomicBool,
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl TerminalDevice {
    /// Create a device reading from `input` and writing to `output`.
    pub fn new<R, W>(size: TermSize, input: R, output: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            size: Mutex::new(size),
            raw_mode: AtomicBool::new(false),
            input: Mutex::new(Box::new(BufReader::new(input))),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// A device with no input and discarded output.
    pub fn detached(size: TermSize) -> Self {
        Self::new(size, io::empty(), io::sink())
    }

    /// Current window size.
    pub fn size(&self) -> TermSize {
        self.size.lock().map(|s| *s).unwrap_or_default()
    }

    /// Update the window size.
    pub fn resize(&self, size: TermSize) {
        if let Ok(mut current) = self.size.lock() {
            *current = size;
        }
    }

    pub fn is_raw_mode(&self) -> bool {
        self.raw_mode.load(Ordering::Acquire)
    }

    pub fn set_raw_mode(&self, enabled: bool) {
        self.raw_mode.store(enabled, Ordering::Release);
    }

    /// Read raw input bytes. Blocks until input is available.
    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        lock(&self.input)?.read(buf)
    }

    /// Read one line of input without its line ending.
    ///
    /// Returns `None` at end of input.
    pub fn read_line(&self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if lock(&self.input)?.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    /// Write all bytes to the terminal output.
    pub fn write_all(&self, data: &[u8]) -> io::Result<()> {
        lock(&self.output)?.write_all(data)
    }

    /// Flush the terminal output.
    pub fn flush(&self) -> io::Result<()> {
        lock(&self.output)?.flush()
    }
}

impl fmt::Debug for TerminalDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalDevice")
            .field("size", &self.size())
            .field("raw_mode", &self.is_raw_mode())
            .finish_non_exhaustive()
    }
}
