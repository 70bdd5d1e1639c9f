//! Transcription result set
//!
//! The result object owns two native arrays, one of segments and one of
//! tokens. This module exposes bounds-checked zero-copy views into them.
//! When the set was fetched with `reuse_existing`, the arrays live inside
//! the context and are overwritten by the next run; an independently
//! requested set keeps its arrays until released.

use std::borrow::Cow;
use std::ffi::{c_char, CStr};
use std::time::Duration;

use crate::com::{impl_com_object, ComPtr};
use crate::error::{NativeError, Result};
use crate::status::{self, HResult, E_POINTER};

/// Token carries the special-token marker in its flags byte.
pub const TOKEN_FLAG_SPECIAL: u32 = 1;

/// A point in time expressed in 100-nanosecond ticks.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    pub ticks: u64,
}

impl TimeSpan {
    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.ticks.saturating_mul(100))
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub begin: TimeSpan,
    pub end: TimeSpan,
}

/// One contiguous span of recognized speech.
///
/// Mirrors the native `sSegment` record; lives in a native-owned array.
#[derive(Debug)]
#[repr(C)]
pub struct Segment {
    text: *const c_char,
    pub time: TimeInterval,
    /// Index of this segment's first token in the token array.
    pub first_token: u32,
    /// Number of tokens belonging to this segment.
    pub count_tokens: u32,
}

impl Segment {
    #[cfg(test)]
    pub(crate) fn for_tests(
        text: *const c_char,
        time: TimeInterval,
        first_token: u32,
        count_tokens: u32,
    ) -> Segment {
        Segment {
            text,
            time,
            first_token,
            count_tokens,
        }
    }

    /// Segment text, decoded as UTF-8.
    ///
    /// Invalid sequences are substituted rather than failing: some languages
    /// legally split code points across adjacent tokens.
    pub fn text(&self) -> Cow<'_, str> {
        decode_native_text(self.text)
    }
}

/// The smallest recognized unit within a segment.
#[repr(C)]
pub struct Token {
    text: *const c_char,
    pub time: TimeInterval,
    /// Probability of the token.
    pub probability: f32,
    /// Probability of the timestamp token.
    pub probability_timestamp: f32,
    /// Sum of probabilities of all timestamp tokens.
    pub ptsum: f32,
    /// Voice length of the token.
    pub vlen: f32,
    /// Native token id.
    pub id: i32,
    pub flags: u32,
}

impl Token {
    #[cfg(test)]
    pub(crate) fn for_tests(text: *const c_char, time: TimeInterval, id: i32) -> Token {
        Token {
            text,
            time,
            probability: 1.0,
            probability_timestamp: 1.0,
            ptsum: 1.0,
            vlen: 1.0,
            id,
            flags: 0,
        }
    }

    /// Token text, decoded as UTF-8 with substitution of invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        decode_native_text(self.text)
    }

    pub fn is_special(&self) -> bool {
        self.flags & TOKEN_FLAG_SPECIAL != 0
    }
}

fn decode_native_text<'a>(text: *const c_char) -> Cow<'a, str> {
    if text.is_null() {
        return Cow::Borrowed("");
    }
    unsafe { CStr::from_ptr(text) }.to_string_lossy()
}

/// Mirrors the native `sTranscribeLength` out-structure of `getSize`.
#[repr(C)]
pub(crate) struct ResultSize {
    pub count_segments: u32,
    pub count_tokens: u32,
}

#[repr(C)]
pub(crate) struct ITranscribeResult {
    pub(crate) vtbl: *const ITranscribeResultVtbl,
}

#[repr(C)]
pub(crate) struct ITranscribeResultVtbl {
    pub query_interface: usize,
    pub add_ref: unsafe extern "system" fn(*mut ITranscribeResult) -> u32,
    pub release: unsafe extern "system" fn(*mut ITranscribeResult) -> u32,
    pub get_size: unsafe extern "system" fn(*mut ITranscribeResult, *mut ResultSize) -> HResult,
    pub get_segments: unsafe extern "system" fn(*mut ITranscribeResult) -> *const Segment,
    pub get_tokens: unsafe extern "system" fn(*mut ITranscribeResult) -> *const Token,
}

impl_com_object!(ITranscribeResult);

/// Owned handle to one native transcription result object.
pub struct ResultSet {
    raw: ComPtr<ITranscribeResult>,
}

unsafe impl Send for ResultSet {}

impl ResultSet {
    pub(crate) fn new(raw: ComPtr<ITranscribeResult>) -> Self {
        Self { raw }
    }

    fn vtbl(&self) -> &ITranscribeResultVtbl {
        unsafe { &*(*self.raw.as_ptr()).vtbl }
    }

    #[cfg(test)]
    pub(crate) fn into_raw(self) -> *mut ITranscribeResult {
        self.raw.into_raw()
    }

    /// Count of segments and tokens in this set.
    pub fn size(&self) -> Result<(u32, u32)> {
        let mut size = ResultSize {
            count_segments: 0,
            count_tokens: 0,
        };
        let hr = unsafe { (self.vtbl().get_size)(self.raw.as_ptr(), &mut size) };
        status::check("iTranscribeResult.getSize", hr)?;
        Ok((size.count_segments, size.count_tokens))
    }

    /// Zero-copy view of the first `count` segments.
    ///
    /// `count` must not exceed the segment count reported by [`Self::size`];
    /// the bound is re-checked here so a stale count can never read past the
    /// native array.
    pub fn segments(&self, count: u32) -> Result<&[Segment]> {
        let (available, _) = self.size()?;
        if count > available {
            return Err(NativeError::OutOfRange {
                requested: count,
                available,
            });
        }
        if count == 0 {
            return Ok(&[]);
        }

        let ptr = unsafe { (self.vtbl().get_segments)(self.raw.as_ptr()) };
        if ptr.is_null() {
            return Err(NativeError::call("getSegments", E_POINTER));
        }
        Ok(unsafe { std::slice::from_raw_parts(ptr, count as usize) })
    }

    /// Zero-copy view of the first `count` tokens, bounds-checked like
    /// [`Self::segments`].
    pub fn tokens(&self, count: u32) -> Result<&[Token]> {
        let (_, available) = self.size()?;
        if count > available {
            return Err(NativeError::OutOfRange {
                requested: count,
                available,
            });
        }
        if count == 0 {
            return Ok(&[]);
        }

        let ptr = unsafe { (self.vtbl().get_tokens)(self.raw.as_ptr()) };
        if ptr.is_null() {
            return Err(NativeError::call("getTokens", E_POINTER));
        }
        Ok(unsafe { std::slice::from_raw_parts(ptr, count as usize) })
    }
}
