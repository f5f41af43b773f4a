//! One worker thread per session.
//!
//! The dispatcher owns the setup order every worker relies on: bind the
//! thread to its session, install its stdout/stderr sinks, then run command
//! code. On exit (normal or panic) the sinks are flushed and the session is
//! marked finished.

use std::any::Any;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::context;
use super::stream::{self, CaptureBuffer, Sink, StreamKind};
use super::{Session, SessionId, SessionState, TerminalDevice};
use crate::config::DispatchSection;
use crate::error::ShellContextError;
use crate::Result;

/// Output destinations for one session worker.
pub struct SessionIo {
    stdout: Sink,
    stderr: Sink,
}

impl SessionIo {
    pub fn new<O, E>(stdout: O, stderr: E) -> Self
    where
        O: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        Self {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
        }
    }

    /// Send both streams to the session's terminal device.
    pub fn terminal(device: &Arc<TerminalDevice>) -> Self {
        Self::new(DeviceWriter(Arc::clone(device)), DeviceWriter(Arc::clone(device)))
    }

    /// Capture both streams into one buffer.
    pub fn captured(buffer: &CaptureBuffer) -> Self {
        Self::new(buffer.clone(), buffer.clone())
    }
}

/// Writer forwarding to a terminal device's output.
struct DeviceWriter(Arc<TerminalDevice>);

impl Write for DeviceWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// Spawns session worker threads.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    thread_name_prefix: String,
    stack_size: Option<usize>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::from_config(&DispatchSection::default())
    }

    pub fn from_config(config: &DispatchSection) -> Self {
        Self {
            thread_name_prefix: config.thread_name_prefix.clone(),
            stack_size: config.stack_size,
        }
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Start a worker thread for `session` and run `command` on it.
    ///
    /// The worker is bound to the session and its streams point at `io`
    /// before `command` starts.
    pub fn spawn<F, T>(
        &self,
        session: Arc<Session>,
        io: SessionIo,
        command: F,
    ) -> Result<WorkerHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let session_id = session.id();
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.thread_name_prefix, session_id));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        session.transition_to(SessionState::Running)?;
        let owner = Arc::clone(&session);

        let spawned = builder.spawn(move || {
            context::bind(&session);
            stream::redirect(StreamKind::Stdout, io.stdout);
            stream::redirect(StreamKind::Stderr, io.stderr);
            let _guard = WorkerGuard { session };

            debug!(session = %session_id, "session worker started");
            command()
        });

        match spawned {
            Ok(inner) => Ok(WorkerHandle { session_id, inner }),
            Err(e) => {
                warn!(session = %session_id, error = %e, "failed to spawn session worker");
                let _ = owner.transition_to(SessionState::Finished);
                Err(ShellContextError::Io(e))
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Flushes the worker's sinks and finishes its session, even on panic.
struct WorkerGuard {
    session: Arc<Session>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        for kind in [StreamKind::Stdout, StreamKind::Stderr] {
            if let Some(mut sink) = stream::take_redirect(kind) {
                if let Err(e) = sink.flush() {
                    warn!(session = %self.session.id(), stream = ?kind, error = %e, "flush failed");
                }
            }
        }
        if let Err(e) = self.session.transition_to(SessionState::Finished) {
            warn!(session = %self.session.id(), error = %e, "could not finish session");
        }
        debug!(session = %self.session.id(), "session worker exited");
    }
}

/// Handle to a running session worker.
#[derive(Debug)]
pub struct WorkerHandle<T> {
    session_id: SessionId,
    inner: JoinHandle<T>,
}

impl<T> WorkerHandle<T> {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn thread(&self) -> &thread::Thread {
        self.inner.thread()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the worker and return the command's result.
    pub fn join(self) -> Result<T> {
        self.inner
            .join()
            .map_err(|payload| ShellContextError::WorkerPanicked(panic_message(payload.as_ref())))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
