//! Native library file version
//!
//! The library ships its version in the file version resource
//! (major.minor.patch.build). The loader reads it before any entry point is
//! called to reject API-incompatible builds up front. On platforms without
//! version resources the query reports "unavailable" and the loader skips
//! the gate.

use std::fmt;
use std::path::Path;

use crate::error::Result;

/// File version of the native library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LibraryVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub build: u16,
}

impl LibraryVersion {
    pub fn at_least(&self, major: u16, minor: u16) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.patch, self.build
        )
    }
}

/// Read the file version resource of the library at `path`.
///
/// Returns `Ok(None)` when the platform or the file carries no version
/// resource.
#[cfg(windows)]
pub(crate) fn query(path: &Path) -> Result<Option<LibraryVersion>> {
    use std::ffi::c_void;

    use windows_sys::Win32::Storage::FileSystem::{
        GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW, VS_FIXEDFILEINFO,
    };

    use crate::wide::{wide, wide_path};

    let wide_file = wide_path(path.as_os_str());

    unsafe {
        let mut handle = 0u32;
        let size = GetFileVersionInfoSizeW(wide_file.as_ptr(), &mut handle);
        if size == 0 {
            return Ok(None);
        }

        let mut block = vec![0u8; size as usize];
        if GetFileVersionInfoW(wide_file.as_ptr(), 0, size, block.as_mut_ptr().cast()) == 0 {
            return Ok(None);
        }

        let root = wide("\\");
        let mut fixed: *mut c_void = std::ptr::null_mut();
        let mut len = 0u32;
        if VerQueryValueW(block.as_ptr().cast(), root.as_ptr(), &mut fixed, &mut len) == 0 {
            return Ok(None);
        }
        if fixed.is_null() || (len as usize) < std::mem::size_of::<VS_FIXEDFILEINFO>() {
            return Ok(None);
        }

        let info = &*(fixed as *const VS_FIXEDFILEINFO);
        Ok(Some(LibraryVersion {
            major: (info.dwFileVersionMS >> 16) as u16,
            minor: (info.dwFileVersionMS & 0xFFFF) as u16,
            patch: (info.dwFileVersionLS >> 16) as u16,
            build: (info.dwFileVersionLS & 0xFFFF) as u16,
        }))
    }
}

#[cfg(not(windows))]
pub(crate) fn query(_path: &Path) -> Result<Option<LibraryVersion>> {
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_least_compares_major_then_minor() {
        let v = LibraryVersion {
            major: 1,
            minor: 10,
            patch: 0,
            build: 42,
        };
        assert!(v.at_least(1, 9));
        assert!(v.at_least(1, 10));
        assert!(!v.at_least(1, 11));
        assert!(!v.at_least(2, 0));
    }

    #[test]
    fn test_display_joins_all_four_parts() {
        let v = LibraryVersion {
            major: 1,
            minor: 12,
            patch: 0,
            build: 3,
        };
        assert_eq!(v.to_string(), "1.12.0.3");
    }
}
