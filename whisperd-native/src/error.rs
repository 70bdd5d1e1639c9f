//! Error types for the native binding layer

use std::path::PathBuf;

use thiserror::Error;

use crate::status::HResult;
use crate::version::LibraryVersion;

pub type Result<T> = std::result::Result<T, NativeError>;

/// Errors produced while driving the native transcription library.
///
/// Every failed native call carries the name of the entry point or vtable
/// slot that failed together with the raw status code, so nothing crossing
/// the boundary fails anonymously.
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("native library not found: {0}")]
    LibraryNotFound(PathBuf),

    #[error("failed to load native library: {0}")]
    LibraryLoad(String),

    #[error("native library version {found} is older than the required 1.9")]
    UnsupportedVersion { found: LibraryVersion },

    #[error("entry point `{0}` missing from native library")]
    EntryPointMissing(&'static str),

    #[error("{op} failed with status {code:#010x}")]
    NativeCallFailed { op: &'static str, code: HResult },

    #[error("model was not loaded as cloneable")]
    NotCloneable,

    /// The default-parameter self-check found a field that does not hold its
    /// documented default. This means the parameter block layout no longer
    /// matches the native ABI and the process must not keep transcribing.
    #[error("parameter block layout mismatch: {0}")]
    LayoutMismatch(String),

    #[error("audio decode failed in {op} with status {code:#010x}")]
    DecodeError { op: &'static str, code: HResult },

    /// A completed run produced zero segments. Surfaced as a failure rather
    /// than an empty success because it almost always indicates a native-side
    /// fault; legitimate silence still yields at least one (empty) segment.
    #[error("transcription produced no segments")]
    EmptyResult,

    #[error("requested {requested} entries but the result holds {available}")]
    OutOfRange { requested: u32, available: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NativeError {
    pub(crate) fn call(op: &'static str, code: HResult) -> Self {
        Self::NativeCallFailed { op, code }
    }

    pub(crate) fn layout<S: Into<String>>(msg: S) -> Self {
        Self::LayoutMismatch(msg.into())
    }

    pub(crate) fn decode(op: &'static str, code: HResult) -> Self {
        Self::DecodeError { op, code }
    }
}
