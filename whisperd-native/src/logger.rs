//! Logger bridge
//!
//! The library accepts a process-wide log sink during initialization. The
//! trampoline installed here forwards every native log record into `tracing`
//! at the mapped level. The sink is a `'static` function with no state, so
//! its lifetime trivially outlives the library; the native side may invoke it
//! from threads this crate never created.

use std::ffi::{c_char, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use crate::status::{HResult, S_OK};

pub(crate) const LOG_LEVEL_DEBUG: u8 = 3;

const LOG_FLAG_USE_STANDARD_ERROR: u8 = 1;

/// Mirrors the native `sLoggerSetup` structure passed to `setupLogger`.
#[repr(C)]
pub(crate) struct LoggerSetup {
    sink: Option<LogSink>,
    context: *mut c_void,
    level: u8,
    flags: u8,
}

pub(crate) type LogSink =
    unsafe extern "system" fn(context: *mut c_void, level: u8, message: *const c_char) -> HResult;

pub(crate) fn tracing_setup(level: u8) -> LoggerSetup {
    LoggerSetup {
        sink: Some(tracing_sink),
        context: std::ptr::null_mut(),
        level,
        flags: LOG_FLAG_USE_STANDARD_ERROR,
    }
}

unsafe extern "system" fn tracing_sink(
    _context: *mut c_void,
    level: u8,
    message: *const c_char,
) -> HResult {
    if message.is_null() {
        return S_OK;
    }
    let text = CStr::from_ptr(message).to_string_lossy();
    let text = text.trim_end();

    // Must not unwind back into foreign code.
    let _ = catch_unwind(AssertUnwindSafe(|| match level {
        0 => error!(target: "whisper", "{text}"),
        1 => warn!(target: "whisper", "{text}"),
        2 => info!(target: "whisper", "{text}"),
        _ => debug!(target: "whisper", "{text}"),
    }));
    S_OK
}
