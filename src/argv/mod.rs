//! Argument-vector marshaling.
//!
//! Converts an ordered list of strings into one contiguous block of
//! null-terminated arguments plus an index into it, and back again.
//!
//! # Example
//!
//! ```
//! use shell_context::argv::{decode_raw, ArgumentBuffer};
//!
//! let buf = ArgumentBuffer::encode(["ssh", "-p", "22", "example.com"]).unwrap();
//! assert_eq!(buf.argc(), 4);
//!
//! // Hand the raw pair across the boundary...
//! let raw = buf.as_raw();
//! let back = unsafe { decode_raw(raw.as_ptr(), raw.argc()) };
//! assert_eq!(back, ["ssh", "-p", "22", "example.com"]);
//! ```

mod buffer;
mod raw;

pub use buffer::ArgumentBuffer;
pub use raw::{decode_raw, EntryPoint, RawArgv};

use tracing::debug;

use crate::Result;

/// Default upper bound on an encoded argument block, in bytes.
pub const DEFAULT_MAX_BYTES: usize = 256 * 1024;

/// Encoder that enforces a size limit on the argument block.
#[derive(Debug, Clone, Copy)]
pub struct ArgvEncoder {
    max_bytes: Option<usize>,
}

impl ArgvEncoder {
    /// Create an encoder with the given limit. `0` disables the limit.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes: (max_bytes > 0).then_some(max_bytes),
        }
    }

    /// Create an encoder without a size limit.
    pub fn unlimited() -> Self {
        Self { max_bytes: None }
    }

    /// Configured limit, if any.
    pub fn max_bytes(&self) -> Option<usize> {
        self.max_bytes
    }

    /// Encode the arguments, failing if the block would exceed the limit.
    pub fn encode<I, S>(&self, args: I) -> Result<ArgumentBuffer>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<S> = args.into_iter().collect();
        ArgumentBuffer::encode_slice(&args, self.max_bytes).map_err(|e| {
            debug!(argc = args.len(), error = %e, "argument encoding rejected");
            e
        })
    }
}

impl Default for ArgvEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

/// Build an [`ArgumentBuffer`] from a list of string-like expressions.
///
/// ```
/// let buf = shell_context::argv!["mosh", "--ssh=ssh -p 22", String::from("host")].unwrap();
/// assert_eq!(buf.decode(), ["mosh", "--ssh=ssh -p 22", "host"]);
///
/// let empty = shell_context::argv![].unwrap();
/// assert!(empty.is_empty());
/// ```
#[macro_export]
macro_rules! argv {
    () => {
        $crate::argv::ArgumentBuffer::encode(::std::iter::empty::<&str>())
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::argv::ArgumentBuffer::encode([$(::std::convert::AsRef::<str>::as_ref(&$arg)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShellContextError;

    #[test]
    fn test_zero_limit_means_unlimited() {
        assert_eq!(ArgvEncoder::new(0).max_bytes(), None);
        assert_eq!(ArgvEncoder::unlimited().max_bytes(), None);
        assert_eq!(ArgvEncoder::default().max_bytes(), Some(DEFAULT_MAX_BYTES));
    }

    #[test]
    fn test_encoder_limit() {
        let encoder = ArgvEncoder::new(8);
        assert!(encoder.encode(["cat", "abc"]).is_ok());

        let err = encoder.encode(["cat", "abcd"]).unwrap_err();
        assert!(matches!(
            err,
            ShellContextError::ArgumentListTooLong { size: 9, limit: 8 }
        ));
    }

    #[test]
    fn test_macro_mixed_types() {
        let host = String::from("example.com");
        let buf = crate::argv!["ssh", host, "-v",].unwrap();
        assert_eq!(buf.decode(), ["ssh", "example.com", "-v"]);
    }
}
