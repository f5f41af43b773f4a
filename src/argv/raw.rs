//! Raw `argc`/`argv` form used at the entry-point boundary.

use std::ffi::{c_char, c_int, CStr};
use std::marker::PhantomData;

use super::ArgumentBuffer;

/// Signature of a process-style entry point (`int main(int argc, char **argv)`).
pub type EntryPoint = unsafe extern "C" fn(argc: c_int, argv: *mut *mut c_char) -> c_int;

/// C-style argument array borrowed from an [`ArgumentBuffer`].
///
/// Holds `argc + 1` pointers; the last one is always null.
pub struct RawArgv<'a> {
    pointers: Vec<*mut c_char>,
    _buffer: PhantomData<&'a ArgumentBuffer>,
}

impl<'a> RawArgv<'a> {
    pub(super) fn new(buffer: &'a ArgumentBuffer) -> Self {
        let base = buffer.as_bytes().as_ptr() as *mut c_char;
        let mut pointers = Vec::with_capacity(buffer.argc() + 1);
        for &offset in buffer.offsets() {
            // SAFETY: every offset is strictly inside the buffer.
            pointers.push(unsafe { base.add(offset) });
        }
        pointers.push(std::ptr::null_mut());

        Self {
            pointers,
            _buffer: PhantomData,
        }
    }

    /// Argument count, excluding the null sentinel.
    pub fn argc(&self) -> c_int {
        // `ArgumentBuffer` rejects counts that do not fit.
        (self.pointers.len() - 1) as c_int
    }

    /// Pointer to the first element of the array.
    pub fn as_ptr(&self) -> *const *const c_char {
        self.pointers.as_ptr() as *const *const c_char
    }

    /// Mutable pointer to the array, for callees declared with `char **argv`.
    ///
    /// The pointer array may be permuted; the bytes it points at must not be
    /// written.
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.pointers.as_mut_ptr()
    }
}

/// Reconstruct strings from a raw `argv` array.
///
/// A null `argv` yields an empty result and a non-positive `argc` yields no
/// entries. A null entry decodes to an empty string. Bytes that are not valid
/// UTF-8 are replaced with `U+FFFD`. Input is never modified.
///
/// # Safety
///
/// If `argv` is non-null it must point to at least `argc` readable pointers,
/// and each non-null entry must point to a NUL-terminated byte run.
pub unsafe fn decode_raw(argv: *const *const c_char, argc: c_int) -> Vec<String> {
    if argv.is_null() {
        return Vec::new();
    }
    let count = usize::try_from(argc).unwrap_or(0);

    (0..count)
        .map(|i| {
            let entry = *argv.add(i);
            if entry.is_null() {
                String::new()
            } else {
                CStr::from_ptr(entry).to_string_lossy().into_owned()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_has_null_sentinel() {
        let buf = ArgumentBuffer::encode(["scp", "a", "b"]).unwrap();
        let raw = buf.as_raw();
        assert_eq!(raw.argc(), 3);
        unsafe {
            assert!(!(*raw.as_ptr().add(2)).is_null());
            assert!((*raw.as_ptr().add(3)).is_null());
        }
    }

    #[test]
    fn test_raw_points_into_buffer() {
        let buf = ArgumentBuffer::encode(["ab", "cd"]).unwrap();
        let raw = buf.as_raw();
        let base = buf.as_bytes().as_ptr() as *const c_char;
        unsafe {
            assert_eq!(*raw.as_ptr(), base);
            assert_eq!(*raw.as_ptr().add(1), base.add(3));
        }
    }

    #[test]
    fn test_empty_raw_is_only_sentinel() {
        let buf = ArgumentBuffer::encode(Vec::<&str>::new()).unwrap();
        let raw = buf.as_raw();
        assert_eq!(raw.argc(), 0);
        unsafe {
            assert!((*raw.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_decode_raw_roundtrip() {
        let buf = ArgumentBuffer::encode(["ping", "-c", "3", "10.0.0.1"]).unwrap();
        let raw = buf.as_raw();
        let decoded = unsafe { decode_raw(raw.as_ptr(), raw.argc()) };
        assert_eq!(decoded, vec!["ping", "-c", "3", "10.0.0.1"]);
    }

    #[test]
    fn test_decode_raw_null_array() {
        let decoded = unsafe { decode_raw(std::ptr::null(), 5) };
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_raw_zero_and_negative_count() {
        let buf = ArgumentBuffer::encode(["x"]).unwrap();
        let raw = buf.as_raw();
        assert!(unsafe { decode_raw(raw.as_ptr(), 0) }.is_empty());
        assert!(unsafe { decode_raw(raw.as_ptr(), -1) }.is_empty());
    }

    #[test]
    fn test_decode_raw_invalid_utf8_is_lossy() {
        let bytes: &[u8] = b"caf\xe9\0";
        let pointers = [bytes.as_ptr() as *const c_char];
        let decoded = unsafe { decode_raw(pointers.as_ptr(), 1) };
        assert_eq!(decoded, vec!["caf\u{FFFD}"]);
    }

    unsafe extern "C" fn count_args(argc: c_int, argv: *mut *mut c_char) -> c_int {
        if !(*argv.add(argc as usize)).is_null() {
            return -1;
        }
        let args = decode_raw(argv as *const *const c_char, argc);
        args.iter().map(|a| a.len() as c_int).sum()
    }

    #[test]
    fn test_invoke_entry_point() {
        let buf = ArgumentBuffer::encode(["wc", "abc", ""]).unwrap();
        let status = unsafe { buf.invoke(count_args) };
        assert_eq!(status, 5);
    }
}
