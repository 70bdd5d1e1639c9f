//! Parameter block shared with the native side
//!
//! `RawFullParams` mirrors the native `sFullParams` structure byte for byte.
//! Field order and sizes are a fixed binary contract: there is no compiler
//! check across the boundary, so the layout is pinned by compile-time size
//! assertions here and validated at runtime by the default-parameter
//! self-check in [`crate::context::ExecutionContext::default_params`].

use std::ffi::c_void;
use std::ops::{BitOr, BitOrAssign};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::context::IContext;
use crate::error::{NativeError, Result};
use crate::lang;
use crate::status::{HResult, E_FAIL, S_FALSE, S_OK};

/// Behavior flags of the parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamFlags(pub u32);

impl ParamFlags {
    pub const NONE: ParamFlags = ParamFlags(0);
    pub const TRANSLATE: ParamFlags = ParamFlags(1 << 0);
    pub const NO_CONTEXT: ParamFlags = ParamFlags(1 << 1);
    pub const SINGLE_SEGMENT: ParamFlags = ParamFlags(1 << 2);
    pub const PRINT_SPECIAL: ParamFlags = ParamFlags(1 << 3);
    pub const PRINT_PROGRESS: ParamFlags = ParamFlags(1 << 4);
    pub const PRINT_REALTIME: ParamFlags = ParamFlags(1 << 5);
    pub const PRINT_TIMESTAMPS: ParamFlags = ParamFlags(1 << 6);
    pub const TOKEN_TIMESTAMPS: ParamFlags = ParamFlags(1 << 7);
    pub const SPEEDUP_AUDIO: ParamFlags = ParamFlags(1 << 8);

    pub fn contains(self, flag: ParamFlags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl BitOr for ParamFlags {
    type Output = ParamFlags;

    fn bitor(self, rhs: ParamFlags) -> ParamFlags {
        ParamFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ParamFlags {
    fn bitor_assign(&mut self, rhs: ParamFlags) {
        self.0 |= rhs.0;
    }
}

/// Decision returned by a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Keep going (`S_OK`).
    Continue,
    /// Stop the run (`S_FALSE`). The run call itself then reports
    /// [`crate::Outcome::Declined`], not an error.
    Abort,
}

pub(crate) type NewSegmentFn =
    unsafe extern "C" fn(ctx: *mut IContext, n_new: u32, user_data: *mut c_void) -> HResult;
pub(crate) type EncoderBeginFn =
    unsafe extern "C" fn(ctx: *mut IContext, user_data: *mut c_void) -> HResult;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GreedyParams {
    pub best_of: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BeamSearchParams {
    pub n_past: i32,
    pub beam_width: i32,
    pub n_best: i32,
}

/// Byte-for-byte mirror of the native `sFullParams` structure.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct RawFullParams {
    pub strategy: u32,
    pub cpu_threads: i32,
    pub n_max_text_ctx: i32,
    pub offset_ms: i32,
    pub duration_ms: i32,
    pub flags: u32,
    pub language: i32,
    pub thold_pt: f32,
    pub thold_ptsum: f32,
    pub max_len: i32,
    pub max_tokens: i32,
    pub greedy: GreedyParams,
    pub beam_search: BeamSearchParams,
    pub audio_ctx: i32,
    pub prompt_tokens: *const i32,
    pub prompt_n_tokens: i32,
    pub new_segment_callback: Option<NewSegmentFn>,
    pub new_segment_callback_user_data: *mut c_void,
    pub encoder_begin_callback: Option<EncoderBeginFn>,
    pub encoder_begin_callback_user_data: *mut c_void,
}

impl RawFullParams {
    pub(crate) fn zeroed() -> Self {
        // All-zero is the state the native side expects to initialize from:
        // null callbacks, null prompt, zero scalars.
        unsafe { std::mem::zeroed() }
    }
}

// The native library is built for 64-bit only; pin the exact struct size the
// x64 ABI produces (64 scalar bytes, prompt slice, two callback slots).
#[cfg(target_pointer_width = "64")]
const _: () = assert!(std::mem::size_of::<RawFullParams>() == 112);

/// Documented defaults checked after `fullDefaultParams` (see
/// [`FullParams::verify_defaults`]).
const DEFAULT_MAX_TEXT_CTX: i32 = 16384;
const DEFAULT_THOLD_PT: f32 = 0.01;
const DEFAULT_THOLD_PTSUM: f32 = 0.01;

type SegmentClosure = dyn Fn(u32) -> CallbackOutcome + Send + Sync;
type EncoderBeginClosure = dyn Fn() -> CallbackOutcome + Send + Sync;

/// Registered callback slots. Boxed so the addresses handed to the native
/// side stay stable for the life of the owning parameter block.
#[derive(Default)]
struct CallbackSlots {
    segment: Option<Box<Box<SegmentClosure>>>,
    encoder_begin: Option<Box<Box<EncoderBeginClosure>>>,
}

impl std::fmt::Debug for CallbackSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSlots")
            .field("segment", &self.segment.is_some())
            .field("encoder_begin", &self.encoder_begin.is_some())
            .finish()
    }
}

fn outcome_to_hresult(outcome: std::thread::Result<CallbackOutcome>) -> HResult {
    match outcome {
        Ok(CallbackOutcome::Continue) => S_OK,
        Ok(CallbackOutcome::Abort) => S_FALSE,
        // A panic must not unwind into foreign code.
        Err(_) => E_FAIL,
    }
}

unsafe extern "C" fn segment_trampoline(
    _ctx: *mut IContext,
    n_new: u32,
    user_data: *mut c_void,
) -> HResult {
    let slot = &*(user_data as *const Box<SegmentClosure>);
    outcome_to_hresult(catch_unwind(AssertUnwindSafe(|| slot(n_new))))
}

unsafe extern "C" fn encoder_begin_trampoline(
    _ctx: *mut IContext,
    user_data: *mut c_void,
) -> HResult {
    let slot = &*(user_data as *const Box<EncoderBeginClosure>);
    outcome_to_hresult(catch_unwind(AssertUnwindSafe(|| slot())))
}

/// Safe owner of one native parameter block.
///
/// All mutators are deliberate no-ops (not errors) on a block that was never
/// allocated, so callers that ignored an allocation failure stay simple.
#[derive(Debug)]
pub struct FullParams {
    raw: Option<Box<RawFullParams>>,
    callbacks: CallbackSlots,
}

// Registered closures are required to be Send + Sync; the raw pointers inside
// the block only ever point at them or at native memory.
unsafe impl Send for FullParams {}

impl FullParams {
    pub(crate) fn from_raw(raw: Box<RawFullParams>) -> Self {
        Self {
            raw: Some(raw),
            callbacks: CallbackSlots::default(),
        }
    }

    /// A block that failed to allocate. Every accessor returns the zero
    /// value and every mutator is a no-op.
    pub fn unallocated() -> Self {
        Self {
            raw: None,
            callbacks: CallbackSlots::default(),
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.raw.is_some()
    }

    pub(crate) fn raw(&self) -> Option<&RawFullParams> {
        self.raw.as_deref()
    }

    fn with_raw(&mut self, f: impl FnOnce(&mut RawFullParams)) {
        if let Some(raw) = self.raw.as_deref_mut() {
            f(raw);
        }
    }

    pub fn cpu_threads(&self) -> i32 {
        self.raw().map_or(0, |r| r.cpu_threads)
    }

    pub fn set_cpu_threads(&mut self, threads: i32) {
        self.with_raw(|r| r.cpu_threads = threads);
    }

    pub fn max_text_ctx(&self) -> i32 {
        self.raw().map_or(0, |r| r.n_max_text_ctx)
    }

    pub fn set_max_text_ctx(&mut self, tokens: i32) {
        self.with_raw(|r| r.n_max_text_ctx = tokens);
    }

    pub fn offset_ms(&self) -> i32 {
        self.raw().map_or(0, |r| r.offset_ms)
    }

    pub fn set_offset_ms(&mut self, offset: i32) {
        self.with_raw(|r| r.offset_ms = offset);
    }

    pub fn duration_ms(&self) -> i32 {
        self.raw().map_or(0, |r| r.duration_ms)
    }

    pub fn set_duration_ms(&mut self, duration: i32) {
        self.with_raw(|r| r.duration_ms = duration);
    }

    pub fn flags(&self) -> ParamFlags {
        ParamFlags(self.raw().map_or(0, |r| r.flags))
    }

    /// Set every bit of `flag` in the behavior-flags field.
    pub fn add_flags(&mut self, flag: ParamFlags) {
        self.with_raw(|r| r.flags |= flag.0);
    }

    /// Clear every bit of `flag` in the behavior-flags field.
    ///
    /// This is a mask-clear, so removing a flag that is not set leaves the
    /// field unchanged.
    pub fn remove_flags(&mut self, flag: ParamFlags) {
        self.with_raw(|r| r.flags &= !flag.0);
    }

    /// Packed-ASCII language code (see [`crate::lang`]).
    pub fn language(&self) -> i32 {
        self.raw().map_or(0, |r| r.language)
    }

    pub fn set_language(&mut self, code: i32) {
        self.with_raw(|r| r.language = code);
    }

    pub fn token_threshold(&self) -> f32 {
        self.raw().map_or(0.0, |r| r.thold_pt)
    }

    pub fn set_token_threshold(&mut self, threshold: f32) {
        self.with_raw(|r| r.thold_pt = threshold);
    }

    pub fn token_sum_threshold(&self) -> f32 {
        self.raw().map_or(0.0, |r| r.thold_ptsum)
    }

    pub fn set_token_sum_threshold(&mut self, threshold: f32) {
        self.with_raw(|r| r.thold_ptsum = threshold);
    }

    pub fn max_segment_length(&self) -> i32 {
        self.raw().map_or(0, |r| r.max_len)
    }

    pub fn set_max_segment_length(&mut self, chars: i32) {
        self.with_raw(|r| r.max_len = chars);
    }

    pub fn max_tokens(&self) -> i32 {
        self.raw().map_or(0, |r| r.max_tokens)
    }

    pub fn set_max_tokens(&mut self, tokens: i32) {
        self.with_raw(|r| r.max_tokens = tokens);
    }

    pub fn audio_ctx(&self) -> i32 {
        self.raw().map_or(0, |r| r.audio_ctx)
    }

    pub fn set_audio_ctx(&mut self, size: i32) {
        self.with_raw(|r| r.audio_ctx = size);
    }

    /// Register a callback invoked after each batch of newly decoded
    /// segments.
    ///
    /// The native side may invoke it from a thread this crate never created,
    /// concurrently with nothing else touching the block, hence `Send +
    /// Sync`. The trampoline stays valid for the life of this block.
    pub fn on_new_segment(&mut self, callback: impl Fn(u32) -> CallbackOutcome + Send + Sync + 'static) {
        if self.raw.is_none() {
            return;
        }
        let slot: Box<Box<SegmentClosure>> = Box::new(Box::new(callback));
        let user_data = &*slot as *const Box<SegmentClosure> as *mut c_void;
        self.callbacks.segment = Some(slot);
        self.with_raw(|r| {
            r.new_segment_callback = Some(segment_trampoline);
            r.new_segment_callback_user_data = user_data;
        });
    }

    /// Register the encoder-begin hook. Returning
    /// [`CallbackOutcome::Abort`] is the only early-abort mechanism the
    /// native boundary offers; it is a narrow hook, not a general
    /// cancellation token.
    pub fn on_encoder_begin(&mut self, callback: impl Fn() -> CallbackOutcome + Send + Sync + 'static) {
        if self.raw.is_none() {
            return;
        }
        let slot: Box<Box<EncoderBeginClosure>> = Box::new(Box::new(callback));
        let user_data = &*slot as *const Box<EncoderBeginClosure> as *mut c_void;
        self.callbacks.encoder_begin = Some(slot);
        self.with_raw(|r| {
            r.encoder_begin_callback = Some(encoder_begin_trampoline);
            r.encoder_begin_callback_user_data = user_data;
        });
    }

    /// Self-check against the documented native defaults.
    ///
    /// `fullDefaultParams` writes a known set of values; if any field reads
    /// back differently the structure layout has drifted from the native ABI
    /// and further use would corrupt memory. Treated as fatal, never
    /// ignored.
    pub(crate) fn verify_defaults(&self) -> Result<()> {
        let raw = self
            .raw()
            .ok_or_else(|| NativeError::layout("parameter block was never allocated"))?;

        if raw.n_max_text_ctx != DEFAULT_MAX_TEXT_CTX {
            return Err(NativeError::layout(format!(
                "n_max_text_ctx read back {} instead of {DEFAULT_MAX_TEXT_CTX}",
                raw.n_max_text_ctx
            )));
        }

        let expected = ParamFlags::PRINT_PROGRESS | ParamFlags::PRINT_TIMESTAMPS;
        if raw.flags != expected.0 {
            return Err(NativeError::layout(format!(
                "flags read back {:#x} instead of {:#x} (progress+timestamps)",
                raw.flags, expected.0
            )));
        }

        if raw.thold_pt != DEFAULT_THOLD_PT || raw.thold_ptsum != DEFAULT_THOLD_PTSUM {
            return Err(NativeError::layout(format!(
                "thresholds read back {}/{} instead of {DEFAULT_THOLD_PT}/{DEFAULT_THOLD_PTSUM}",
                raw.thold_pt, raw.thold_ptsum
            )));
        }

        if raw.language != lang::ENGLISH {
            return Err(NativeError::layout(format!(
                "language read back {:#x} instead of English ({:#x})",
                raw.language,
                lang::ENGLISH
            )));
        }

        Ok(())
    }
}
