//! Per-thread session binding.
//!
//! Each session worker thread is bound to exactly one [`Session`] before any
//! command runs on it. Command code then resolves its session, and through
//! it the terminal device, from the calling thread alone.
//!
//! The binding is a `Weak` reference: it never keeps a session alive.
//! Accessing the context from an unbound thread, or after the session was
//! released, is a programming error in the dispatch layer and panics.

use std::cell::OnceCell;
use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, error};

use super::{Session, SessionId, TerminalDevice};

struct Binding {
    id: SessionId,
    session: Weak<Session>,
}

thread_local! {
    static BINDING: OnceCell<Binding> = const { OnceCell::new() };
}

/// Describe the calling thread for diagnostics.
pub(super) fn thread_label() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => format!("'{}'", name),
        None => format!("{:?}", thread.id()),
    }
}

/// Log and panic. Used for broken binding invariants.
#[cold]
pub(super) fn fatal(args: fmt::Arguments<'_>) -> ! {
    let message = args.to_string();
    error!("{}", message);
    panic!("{}", message);
}

/// Bind the calling thread to `session`.
///
/// Must be called once per worker thread, before any command code runs.
///
/// # Panics
///
/// Panics if the thread is already bound.
pub fn bind(session: &Arc<Session>) {
    let id = session.id();
    let result = BINDING.with(|slot| {
        slot.set(Binding {
            id,
            session: Arc::downgrade(session),
        })
        .map_err(|_| slot.get().map(|existing| existing.id))
    });

    match result {
        Ok(()) => debug!(session = %id, thread = %thread_label(), "thread bound to session"),
        Err(existing) => fatal(format_args!(
            "thread {} is already bound to session {}; refusing to rebind to {}",
            thread_label(),
            existing.map(|e| e.to_string()).unwrap_or_default(),
            id
        )),
    }
}

/// Check if the calling thread has a session binding.
pub fn is_bound() -> bool {
    BINDING.with(|slot| slot.get().is_some())
}

/// ID of the session bound to the calling thread, if any.
///
/// Does not check that the session is still alive.
pub fn current_session_id() -> Option<SessionId> {
    BINDING.with(|slot| slot.get().map(|b| b.id))
}

/// Session bound to the calling thread, or `None` if unbound or released.
pub fn try_current_session() -> Option<Arc<Session>> {
    BINDING.with(|slot| slot.get().and_then(|b| b.session.upgrade()))
}

/// Session bound to the calling thread.
///
/// # Panics
///
/// Panics if the thread was never bound, or if its session has already been
/// released by the dispatch layer.
pub fn current_session() -> Arc<Session> {
    let resolved = BINDING.with(|slot| slot.get().map(|b| (b.id, b.session.upgrade())));

    match resolved {
        Some((_, Some(session))) => session,
        Some((id, None)) => fatal(format_args!(
            "session {} bound to thread {} has already been released",
            id,
            thread_label()
        )),
        None => fatal(format_args!(
            "no session bound to thread {}; bind() must run before command code",
            thread_label()
        )),
    }
}

/// Terminal device of the session bound to the calling thread.
///
/// # Panics
///
/// Same conditions as [`current_session`].
pub fn current_terminal_device() -> Arc<TerminalDevice> {
    current_session().device()
}
