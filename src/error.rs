//! Error types for shell-context.

use thiserror::Error;

/// Main error type for shell-context operations.
#[derive(Error, Debug)]
pub enum ShellContextError {
    /// The argument block could not be allocated.
    #[error("failed to allocate {bytes} bytes for argument vector")]
    Allocation { bytes: usize },

    /// An argument contains a NUL byte and cannot be null-terminated losslessly.
    #[error("argument {index} contains an interior NUL byte")]
    InteriorNul { index: usize },

    /// More arguments than a C `int` can count.
    #[error("too many arguments: {0}")]
    TooManyArguments(usize),

    /// Encoded argument block exceeds the configured limit.
    #[error("argument list too long: {size} bytes exceeds limit of {limit}")]
    ArgumentListTooLong { size: usize, limit: usize },

    /// Session with the given ID already exists.
    #[error("session already exists: {0}")]
    SessionExists(String),

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::SessionState,
        to: crate::session::SessionState,
    },

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A session worker thread panicked.
    #[error("session worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Convenience Result type for shell-context operations.
pub type Result<T> = std::result::Result<T, ShellContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_display() {
        let err = ShellContextError::Allocation { bytes: 4096 };
        assert!(err.to_string().contains("4096"));
        assert!(err.to_string().contains("allocate"));
    }

    #[test]
    fn test_interior_nul_display() {
        let err = ShellContextError::InteriorNul { index: 2 };
        assert_eq!(err.to_string(), "argument 2 contains an interior NUL byte");
    }

    #[test]
    fn test_too_long_display() {
        let err = ShellContextError::ArgumentListTooLong {
            size: 300,
            limit: 256,
        };
        assert!(err.to_string().contains("300"));
        assert!(err.to_string().contains("256"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed");
        let err: ShellContextError = io_err.into();
        assert!(matches!(err, ShellContextError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }
}
