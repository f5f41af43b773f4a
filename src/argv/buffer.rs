//! Contiguous, null-terminated argument block.

use std::ffi::{c_int, CStr};
use std::fmt;

use tracing::trace;

use super::raw::{EntryPoint, RawArgv};
use crate::error::ShellContextError;
use crate::Result;

/// An argument vector stored as one byte arena plus an index of start offsets.
///
/// Every argument is laid out back-to-back in `bytes`, each followed by a
/// single zero byte. `offsets[i]` is where argument `i` starts. The buffer
/// is immutable once built and owns both allocations; dropping it releases
/// them.
#[derive(Clone, PartialEq, Eq)]
pub struct ArgumentBuffer {
    bytes: Box<[u8]>,
    offsets: Box<[usize]>,
}

impl ArgumentBuffer {
    /// Encode a sequence of arguments into a single contiguous block.
    ///
    /// Empty sequences and empty strings are allowed. Fails if an argument
    /// contains a NUL byte or if the block cannot be allocated.
    ///
    /// ```
    /// use shell_context::ArgumentBuffer;
    ///
    /// let buf = ArgumentBuffer::encode(["ls", "-la", "/tmp"]).unwrap();
    /// assert_eq!(buf.argc(), 3);
    /// assert_eq!(buf.as_bytes(), b"ls\0-la\0/tmp\0");
    /// ```
    pub fn encode<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<S> = args.into_iter().collect();
        Self::encode_slice(&args, None)
    }

    /// Encode with an optional upper bound on the total block size.
    pub(crate) fn encode_slice<S: AsRef<str>>(args: &[S], limit: Option<usize>) -> Result<Self> {
        if c_int::try_from(args.len()).is_err() {
            return Err(ShellContextError::TooManyArguments(args.len()));
        }

        // One terminator byte per argument.
        let mut size = 0usize;
        for (index, arg) in args.iter().enumerate() {
            let arg = arg.as_ref().as_bytes();
            if arg.contains(&0) {
                return Err(ShellContextError::InteriorNul { index });
            }
            size = size
                .checked_add(arg.len() + 1)
                .ok_or(ShellContextError::Allocation { bytes: usize::MAX })?;
        }

        if let Some(limit) = limit {
            if size > limit {
                return Err(ShellContextError::ArgumentListTooLong { size, limit });
            }
        }

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| ShellContextError::Allocation { bytes: size })?;
        bytes.resize(size, 0u8);

        let mut offsets = Vec::new();
        offsets
            .try_reserve_exact(args.len())
            .map_err(|_| ShellContextError::Allocation {
                bytes: args.len().saturating_mul(std::mem::size_of::<usize>()),
            })?;

        // The block starts zeroed, so each terminator is already in place.
        let mut cursor = 0;
        for arg in args {
            let arg = arg.as_ref().as_bytes();
            bytes[cursor..cursor + arg.len()].copy_from_slice(arg);
            offsets.push(cursor);
            cursor += arg.len() + 1;
        }
        debug_assert_eq!(cursor, size);

        trace!(argc = args.len(), size, "encoded argument vector");

        Ok(Self {
            bytes: bytes.into_boxed_slice(),
            offsets: offsets.into_boxed_slice(),
        })
    }

    /// Number of arguments.
    pub fn argc(&self) -> usize {
        self.offsets.len()
    }

    /// Check if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The whole block, terminators included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Start offset of every argument within [`as_bytes`](Self::as_bytes).
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Bytes of argument `index`, without its terminator.
    pub fn argument_at(&self, index: usize) -> Option<&[u8]> {
        let start = *self.offsets.get(index)?;
        let end = match self.offsets.get(index + 1) {
            Some(next) => next - 1,
            None => self.bytes.len() - 1,
        };
        Some(&self.bytes[start..end])
    }

    /// Argument `index` as a C string, terminator included.
    pub fn cstr_at(&self, index: usize) -> Option<&CStr> {
        let start = *self.offsets.get(index)?;
        CStr::from_bytes_until_nul(&self.bytes[start..]).ok()
    }

    /// Argument `index` as a string slice.
    pub fn str_at(&self, index: usize) -> Option<&str> {
        // Built from `&str` input, so always valid UTF-8.
        self.argument_at(index)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Iterate over the arguments in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.argc()).filter_map(move |i| self.str_at(i))
    }

    /// Reconstruct the original arguments.
    pub fn decode(&self) -> Vec<String> {
        self.iter().map(str::to_owned).collect()
    }

    /// Export the C-style `argv` array for a call across an FFI boundary.
    ///
    /// The returned array holds `argc` pointers into this buffer followed by
    /// a null sentinel. It borrows the buffer, so it cannot outlive it.
    pub fn as_raw(&self) -> RawArgv<'_> {
        RawArgv::new(self)
    }

    /// Call a process-style entry point with this argument vector.
    ///
    /// Returns the entry point's status code.
    ///
    /// # Safety
    ///
    /// `entry` must treat the argument bytes as read-only and must not keep
    /// any pointer from `argv` after it returns. It may reorder the pointer
    /// array itself (as `getopt` does).
    pub unsafe fn invoke(&self, entry: EntryPoint) -> c_int {
        let mut raw = self.as_raw();
        entry(raw.argc(), raw.as_mut_ptr())
    }
}

impl fmt::Debug for ArgumentBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentBuffer")
            .field("argc", &self.argc())
            .field("args", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl<'a> IntoIterator for &'a ArgumentBuffer {
    type Item = &'a str;
    type IntoIter = Box<dyn Iterator<Item = &'a str> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_back_to_back() {
        let buf = ArgumentBuffer::encode(["ssh", "-p", "2222", "host"]).unwrap();
        assert_eq!(buf.as_bytes(), b"ssh\0-p\02222\0host\0");
        assert_eq!(buf.offsets(), &[0, 4, 7, 12]);
        assert_eq!(buf.argc(), 4);
    }

    #[test]
    fn test_empty_sequence() {
        let buf = ArgumentBuffer::encode(Vec::<String>::new()).unwrap();
        assert_eq!(buf.argc(), 0);
        assert!(buf.is_empty());
        assert!(buf.as_bytes().is_empty());
        assert!(buf.decode().is_empty());
    }

    #[test]
    fn test_empty_strings_take_one_byte() {
        let buf = ArgumentBuffer::encode(["", "a", ""]).unwrap();
        assert_eq!(buf.as_bytes().len(), 4);
        assert_eq!(buf.offsets(), &[0, 1, 3]);
        assert_eq!(buf.decode(), vec!["", "a", ""]);
    }

    #[test]
    fn test_interior_nul_rejected() {
        let err = ArgumentBuffer::encode(["ok", "bad\0arg"]).unwrap_err();
        assert!(matches!(err, ShellContextError::InteriorNul { index: 1 }));
    }

    #[test]
    fn test_limit_enforced() {
        let args = ["echo", "hello"];
        assert!(ArgumentBuffer::encode_slice(&args, Some(11)).is_ok());

        let err = ArgumentBuffer::encode_slice(&args, Some(10)).unwrap_err();
        assert!(matches!(
            err,
            ShellContextError::ArgumentListTooLong {
                size: 11,
                limit: 10
            }
        ));
    }

    #[test]
    fn test_accessors() {
        let buf = ArgumentBuffer::encode(["mosh", "ünïcödé", ""]).unwrap();
        assert_eq!(buf.argument_at(0), Some(&b"mosh"[..]));
        assert_eq!(buf.str_at(1), Some("ünïcödé"));
        assert_eq!(buf.str_at(2), Some(""));
        assert_eq!(buf.argument_at(3), None);
        assert_eq!(buf.cstr_at(0).unwrap().to_bytes_with_nul(), b"mosh\0");
        assert_eq!(buf.cstr_at(2).unwrap().to_bytes(), b"");
    }

    #[test]
    fn test_owned_string_input() {
        let args = vec![String::from("git"), String::from("status")];
        let buf = ArgumentBuffer::encode(&args).unwrap();
        assert_eq!(buf.decode(), args);

        let joined: Vec<&str> = (&buf).into_iter().collect();
        assert_eq!(joined, ["git", "status"]);
    }

    #[test]
    fn test_debug_lists_arguments() {
        let buf = ArgumentBuffer::encode(["a", "b"]).unwrap();
        let dbg = format!("{:?}", buf);
        assert!(dbg.contains("argc: 2"));
        assert!(dbg.contains("\"b\""));
    }
}
