//! # shell-context
//!
//! Command-execution context for multi-session shell hosts.
//!
//! A host running several interactive sessions at once gives each session
//! its own worker thread. This crate provides the two pieces command code
//! needs on such a thread:
//!
//! - **Argument vectors**: [`ArgumentBuffer`] packs a list of strings into
//!   one contiguous block of NUL-terminated arguments and exports the
//!   `argc`/`argv` pair process-style entry points expect.
//! - **Session context**: a per-thread binding from the worker thread to its
//!   [`Session`], plus per-thread stdout/stderr, so command code can reach
//!   its terminal and output without being handed either.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_context::{
//!     session_println, CaptureBuffer, Dispatcher, SessionConfig, SessionIo, SessionStore,
//!     TermSize, TerminalDevice,
//! };
//!
//! fn main() -> shell_context::Result<()> {
//!     shell_context::logging::try_init().ok();
//!
//!     let store = SessionStore::new();
//!     let session = store.create(
//!         SessionConfig::named("prod"),
//!         TerminalDevice::detached(TermSize::default()),
//!     )?;
//!
//!     let output = CaptureBuffer::new();
//!     let worker = Dispatcher::new().spawn(session, SessionIo::captured(&output), || {
//!         let tty = shell_context::current_terminal_device();
//!         session_println!("terminal is {}x{}", tty.size().cols, tty.size().rows);
//!     })?;
//!     worker.join()?;
//!
//!     print!("{}", output.text());
//!     Ok(())
//! }
//! ```

pub mod argv;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;

// Re-export commonly used types
pub use argv::{decode_raw, ArgumentBuffer, ArgvEncoder, EntryPoint, RawArgv};
pub use error::{Result, ShellContextError};
pub use session::{
    bind, current_error_stream, current_output_stream, current_session, current_terminal_device,
    try_current_session, CaptureBuffer, Dispatcher, Session, SessionConfig, SessionId, SessionIo,
    SessionState, SessionStore, TermSize, TerminalDevice, WorkerHandle,
};
