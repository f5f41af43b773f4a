//! Session context.
//!
//! Sessions, their terminal devices and the per-thread machinery that lets
//! command code find "its" session and output streams without being handed
//! either explicitly.

mod context;
mod device;
mod dispatch;
mod id;
mod state;
mod store;
mod stream;

pub use context::{
    bind, current_session, current_session_id, current_terminal_device, is_bound,
    try_current_session,
};
pub use device::{TermSize, TerminalDevice};
pub use dispatch::{Dispatcher, SessionIo, WorkerHandle};
pub use id::SessionId;
pub use state::SessionState;
pub use store::{Session, SessionConfig, SessionStore};
#[cfg(unix)]
pub use stream::fd_sink;
#[doc(hidden)]
pub use stream::print_to_stream;
pub use stream::{
    current_error_stream, current_output_stream, is_redirected, redirect, redirect_stderr,
    redirect_stdout, take_redirect, CaptureBuffer, SessionStream, Sink, StreamKind,
};
