//! HRESULT status translation
//!
//! The native library reports every method outcome through a single integer
//! channel. Two values are not errors: `S_OK` means proceed, and `S_FALSE` is
//! the decline sentinel used by callback-driven early abort (an encoder-begin
//! hook returning "stop" surfaces as `S_FALSE` from the run call). The two
//! must never be conflated with failure codes.

use crate::error::{NativeError, Result};

/// Raw status code as returned by the native side.
pub type HResult = i32;

pub const S_OK: HResult = 0;
pub const S_FALSE: HResult = 1;

pub const E_FAIL: HResult = 0x8000_4005_u32 as i32;
pub const E_POINTER: HResult = 0x8000_4003_u32 as i32;
pub const E_INVALIDARG: HResult = 0x8007_0057_u32 as i32;

/// Non-error outcome of a native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call completed (`S_OK`).
    Completed,
    /// The call was stopped by a declining callback (`S_FALSE`).
    Declined,
}

/// Translate a raw status code into a local result.
///
/// Anything other than the two non-error sentinels is surfaced as
/// [`NativeError::NativeCallFailed`] carrying the operation name and the raw
/// code for diagnostics.
pub fn check(op: &'static str, code: HResult) -> Result<Outcome> {
    match code {
        S_OK => Ok(Outcome::Completed),
        S_FALSE => Ok(Outcome::Declined),
        code => Err(NativeError::call(op, code)),
    }
}
