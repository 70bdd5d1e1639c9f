//! Wide-character (UTF-16) string encoding for native text parameters

use std::ffi::OsStr;

/// Encode a string as a null-terminated UTF-16 buffer.
///
/// The native side expects platform wide strings for every text parameter
/// (library path, model path, adapter name).
pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Encode a path as a null-terminated UTF-16 buffer.
#[cfg(windows)]
pub(crate) fn wide_path(path: &OsStr) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.encode_wide().chain(std::iter::once(0)).collect()
}

#[cfg(not(windows))]
pub(crate) fn wide_path(path: &OsStr) -> Vec<u16> {
    wide(&path.to_string_lossy())
}
