//! Execution context: one native transcription session
//!
//! A context is created from exactly one model and mutates internal state in
//! place during a run, so it is never safe to share across concurrent
//! transcriptions. Every method that runs inference takes `&mut self` and
//! blocks the calling thread for the whole inference duration; callers
//! needing bounded latency must put their own watchdog around the call.

use std::ops::{BitOr, BitOrAssign};

use crate::com::{impl_com_object, ComPtr};
use crate::error::{NativeError, Result};
use crate::media::{AudioBuffer, AudioReader, IAudioBuffer, IAudioReader};
use crate::model::{IModel, Model, ModelSetup};
use crate::params::{FullParams, RawFullParams};
use crate::result::{ITranscribeResult, ResultSet};
use crate::status::{self, HResult, Outcome, E_POINTER};

/// Decoding strategy requested from `fullDefaultParams`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingStrategy {
    Greedy = 0,
    BeamSearch = 1,
}

/// Flags controlling what `getResults` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultFlags(pub u32);

impl ResultFlags {
    pub const NONE: ResultFlags = ResultFlags(0);
    /// Return individual tokens in addition to segments.
    pub const TOKENS: ResultFlags = ResultFlags(1);
    /// Return timestamps.
    pub const TIMESTAMPS: ResultFlags = ResultFlags(2);
    /// Allocate an independent native result object instead of a view into
    /// the object retained by the context.
    pub(crate) const NEW_OBJECT: ResultFlags = ResultFlags(0x100);
}

impl BitOr for ResultFlags {
    type Output = ResultFlags;

    fn bitor(self, rhs: ResultFlags) -> ResultFlags {
        ResultFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResultFlags {
    fn bitor_assign(&mut self, rhs: ResultFlags) {
        self.0 |= rhs.0;
    }
}

/// No-op progress sink passed to `runStreamed`.
#[repr(C)]
pub(crate) struct ProgressSink {
    pfn: usize,
    pv: usize,
}

#[repr(C)]
pub(crate) struct IContext {
    pub(crate) vtbl: *const IContextVtbl,
}

/// Method slots of the native session object, in fixed vtable order.
#[repr(C)]
pub(crate) struct IContextVtbl {
    pub query_interface: usize,
    pub add_ref: unsafe extern "system" fn(*mut IContext) -> u32,
    pub release: unsafe extern "system" fn(*mut IContext) -> u32,
    pub run_full: unsafe extern "system" fn(
        *mut IContext,
        *const RawFullParams,
        *const IAudioBuffer,
    ) -> HResult,
    pub run_streamed: unsafe extern "system" fn(
        *mut IContext,
        *const RawFullParams,
        *const ProgressSink,
        *const IAudioReader,
    ) -> HResult,
    pub run_capture: usize,
    pub get_results:
        unsafe extern "system" fn(*mut IContext, u32, *mut *mut ITranscribeResult) -> HResult,
    pub detect_speaker: usize,
    pub get_model: unsafe extern "system" fn(*mut IContext, *mut *mut IModel) -> HResult,
    pub full_default_params:
        unsafe extern "system" fn(*mut IContext, u32, *mut RawFullParams) -> HResult,
    pub timings_print: unsafe extern "system" fn(*mut IContext) -> HResult,
    pub timings_reset: unsafe extern "system" fn(*mut IContext) -> HResult,
}

impl_com_object!(IContext);

/// Owned handle to one native transcription session.
pub struct ExecutionContext {
    raw: ComPtr<IContext>,
    setup: ModelSetup,
}

// May move between threads, but is not Sync: a run mutates native buffers.
unsafe impl Send for ExecutionContext {}

impl ExecutionContext {
    pub(crate) fn new(raw: ComPtr<IContext>, setup: ModelSetup) -> Self {
        Self { raw, setup }
    }

    fn vtbl(&self) -> &IContextVtbl {
        unsafe { &*(*self.raw.as_ptr()).vtbl }
    }

    #[cfg(test)]
    pub(crate) fn raw_ptr(&self) -> *mut IContext {
        self.raw.as_ptr()
    }

    /// Request a default-initialized parameter block for `strategy`.
    ///
    /// The block is allocated locally, filled in by the native side, and then
    /// verified against the documented defaults. A mismatch means the local
    /// structure layout has drifted from the native ABI; it is reported as
    /// the fatal [`NativeError::LayoutMismatch`].
    pub fn default_params(&self, strategy: SamplingStrategy) -> Result<FullParams> {
        let mut raw = Box::new(RawFullParams::zeroed());
        let hr = unsafe {
            (self.vtbl().full_default_params)(self.raw.as_ptr(), strategy as u32, &mut *raw)
        };
        status::check("fullDefaultParams", hr)?;

        let params = FullParams::from_raw(raw);
        params.verify_defaults()?;
        Ok(params)
    }

    /// Run a complete non-incremental transcription pass over a decoded
    /// buffer. Blocks until inference finishes.
    ///
    /// Returns [`Outcome::Declined`] when a registered encoder-begin hook
    /// stopped the run; that is not an error.
    pub fn run_full(&mut self, params: &FullParams, buffer: &AudioBuffer) -> Result<Outcome> {
        let raw = params
            .raw()
            .ok_or(NativeError::call("runFull", E_POINTER))?;
        let hr = unsafe { (self.vtbl().run_full)(self.raw.as_ptr(), raw, buffer.as_ptr()) };
        status::check("runFull", hr)
    }

    /// Run an incremental transcription pass over a streaming reader.
    ///
    /// Progress reporting is not required for correctness; a zeroed no-op
    /// sink is passed.
    pub fn run_streamed(&mut self, params: &FullParams, reader: &AudioReader<'_>) -> Result<Outcome> {
        let raw = params
            .raw()
            .ok_or(NativeError::call("runStreamed", E_POINTER))?;
        let sink = ProgressSink { pfn: 0, pv: 0 };
        let hr = unsafe {
            (self.vtbl().run_streamed)(self.raw.as_ptr(), raw, &sink, reader.as_ptr())
        };
        status::check("runStreamed", hr)
    }

    /// Fetch the results of the last run.
    ///
    /// With `reuse_existing` the returned set is a view into the result
    /// object retained by this context, whose contents are overwritten by
    /// the next run. Without it the native side allocates an independent
    /// object that survives later runs.
    pub fn get_results(&mut self, flags: ResultFlags, reuse_existing: bool) -> Result<ResultSet> {
        let mut flags = flags;
        if !reuse_existing {
            flags |= ResultFlags::NEW_OBJECT;
        }

        let mut out: *mut ITranscribeResult = std::ptr::null_mut();
        let hr = unsafe { (self.vtbl().get_results)(self.raw.as_ptr(), flags.0, &mut out) };
        status::check("getResults", hr)?;

        let raw =
            unsafe { ComPtr::from_raw(out) }.ok_or(NativeError::call("getResults", E_POINTER))?;
        Ok(ResultSet::new(raw))
    }

    /// The model this context was created from, as a fresh owned handle.
    pub fn get_model(&self) -> Result<Model> {
        let mut out: *mut IModel = std::ptr::null_mut();
        let hr = unsafe { (self.vtbl().get_model)(self.raw.as_ptr(), &mut out) };
        status::check("getModel", hr)?;

        let raw =
            unsafe { ComPtr::from_raw(out) }.ok_or(NativeError::call("getModel", E_POINTER))?;
        Ok(Model::new(raw, self.setup.clone()))
    }

    /// Print accumulated inference timings through the native logger.
    pub fn timings_print(&self) -> Result<()> {
        let hr = unsafe { (self.vtbl().timings_print)(self.raw.as_ptr()) };
        status::check("timingsPrint", hr).map(|_| ())
    }

    /// Reset accumulated inference timings.
    pub fn timings_reset(&self) -> Result<()> {
        let hr = unsafe { (self.vtbl().timings_reset)(self.raw.as_ptr()) };
        status::check("timingsReset", hr).map(|_| ())
    }
}
