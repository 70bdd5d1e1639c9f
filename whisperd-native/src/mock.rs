//! In-process stand-ins for the native objects
//!
//! Each mock is a heap allocation whose first field is the matching interface
//! struct, so a pointer to the allocation is a valid interface pointer. The
//! refcount discipline matches the real library's: the allocation is freed
//! when the last reference is released, which lets tests assert that every
//! acquired reference is released exactly once.

use std::cell::Cell;
use std::ffi::{c_void, CString};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::com::{ComObject, ComPtr};
use crate::context::{ExecutionContext, IContext, IContextVtbl, ProgressSink};
use crate::lang;
use crate::media::{
    AudioBuffer, IAudioBuffer, IAudioBufferVtbl, IAudioReader, IAudioReaderVtbl, IMediaFoundation,
    IMediaFoundationVtbl, MediaFoundation,
};
use crate::model::{IModel, IModelVtbl, Model, ModelSetup};
use crate::params::{ParamFlags, RawFullParams};
use crate::result::{
    ITranscribeResult, ITranscribeResultVtbl, ResultSet, ResultSize, Segment, TimeInterval,
    TimeSpan, Token,
};
use crate::status::{HResult, E_FAIL, E_INVALIDARG, E_POINTER, S_OK};

// Thread-local so concurrently running tests cannot see each other's
// allocations; mocks never migrate across threads.
thread_local! {
    static LIVE_MODELS: Cell<usize> = Cell::new(0);
}

// ---------------------------------------------------------------- model ----

#[repr(C)]
struct MockModelObject {
    iface: IModel,
    refs: AtomicU32,
}

static MODEL_VTBL: IModelVtbl = IModelVtbl {
    query_interface: 0,
    add_ref: model_add_ref,
    release: model_release,
    create_context: model_create_context,
    tokenize: 0,
    is_multilingual: model_is_multilingual,
    get_special_tokens: 0,
    string_from_token: 0,
    clone_model: model_clone,
};

fn alloc_model() -> *mut IModel {
    let obj = Box::new(MockModelObject {
        iface: IModel { vtbl: &MODEL_VTBL },
        refs: AtomicU32::new(1),
    });
    LIVE_MODELS.with(|live| live.set(live.get() + 1));
    Box::into_raw(obj) as *mut IModel
}

unsafe extern "system" fn model_add_ref(this: *mut IModel) -> u32 {
    let obj = &*(this as *mut MockModelObject);
    obj.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn model_release(this: *mut IModel) -> u32 {
    let obj = &*(this as *mut MockModelObject);
    let remaining = obj.refs.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        drop(Box::from_raw(this as *mut MockModelObject));
        LIVE_MODELS.with(|live| live.set(live.get() - 1));
    }
    remaining
}

unsafe extern "system" fn model_is_multilingual(_this: *mut IModel) -> HResult {
    S_OK
}

unsafe extern "system" fn model_create_context(
    this: *mut IModel,
    out: *mut *mut IContext,
) -> HResult {
    if out.is_null() {
        return E_POINTER;
    }
    // The context keeps its model alive, like the real library does.
    model_add_ref(this);
    *out = alloc_context(this);
    S_OK
}

unsafe extern "system" fn model_clone(this: *mut IModel, out: *mut *mut IModel) -> HResult {
    if this.is_null() || out.is_null() {
        return E_POINTER;
    }
    *out = alloc_model();
    S_OK
}

pub(crate) struct MockModel;

impl MockModel {
    pub(crate) fn spawn(setup: ModelSetup) -> Model {
        let raw = unsafe { ComPtr::from_raw(alloc_model()) }.unwrap();
        Model::new(raw, setup)
    }

    /// Number of mock model allocations currently alive on this thread.
    pub(crate) fn live() -> usize {
        LIVE_MODELS.with(Cell::get)
    }
}

// -------------------------------------------------------------- context ----

#[repr(C)]
struct MockContextObject {
    iface: IContext,
    refs: AtomicU32,
    model: *mut IModel,
    poisoned: AtomicBool,
    staged: Cell<*mut ITranscribeResult>,
}

static CONTEXT_VTBL: IContextVtbl = IContextVtbl {
    query_interface: 0,
    add_ref: context_add_ref,
    release: context_release,
    run_full: context_run_full,
    run_streamed: context_run_streamed,
    run_capture: 0,
    get_results: context_get_results,
    detect_speaker: 0,
    get_model: context_get_model,
    full_default_params: context_full_default_params,
    timings_print: context_timings,
    timings_reset: context_timings,
};

fn alloc_context(model: *mut IModel) -> *mut IContext {
    let obj = Box::new(MockContextObject {
        iface: IContext {
            vtbl: &CONTEXT_VTBL,
        },
        refs: AtomicU32::new(1),
        model,
        poisoned: AtomicBool::new(false),
        staged: Cell::new(std::ptr::null_mut()),
    });
    Box::into_raw(obj) as *mut IContext
}

unsafe extern "system" fn context_add_ref(this: *mut IContext) -> u32 {
    let obj = &*(this as *mut MockContextObject);
    obj.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn context_release(this: *mut IContext) -> u32 {
    let obj = &*(this as *mut MockContextObject);
    let remaining = obj.refs.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        let obj = Box::from_raw(this as *mut MockContextObject);
        IModel::release(obj.model);
        let staged = obj.staged.get();
        if !staged.is_null() {
            ITranscribeResult::release(staged);
        }
    }
    remaining
}

unsafe fn invoke_encoder_begin(ctx: *mut IContext, params: *const RawFullParams) -> HResult {
    let raw = &*params;
    match raw.encoder_begin_callback {
        Some(hook) => hook(ctx, raw.encoder_begin_callback_user_data),
        None => S_OK,
    }
}

unsafe extern "system" fn context_run_full(
    this: *mut IContext,
    params: *const RawFullParams,
    buffer: *const IAudioBuffer,
) -> HResult {
    if params.is_null() || buffer.is_null() {
        return E_POINTER;
    }
    invoke_encoder_begin(this, params)
}

unsafe extern "system" fn context_run_streamed(
    this: *mut IContext,
    params: *const RawFullParams,
    _progress: *const ProgressSink,
    reader: *const IAudioReader,
) -> HResult {
    if params.is_null() || reader.is_null() {
        return E_POINTER;
    }
    invoke_encoder_begin(this, params)
}

unsafe extern "system" fn context_get_results(
    this: *mut IContext,
    _flags: u32,
    out: *mut *mut ITranscribeResult,
) -> HResult {
    if out.is_null() {
        return E_POINTER;
    }
    let obj = &*(this as *mut MockContextObject);
    let staged = obj.staged.get();
    *out = if staged.is_null() {
        alloc_result(&[])
    } else {
        ITranscribeResult::add_ref(staged);
        staged
    };
    S_OK
}

unsafe extern "system" fn context_get_model(this: *mut IContext, out: *mut *mut IModel) -> HResult {
    if out.is_null() {
        return E_POINTER;
    }
    let obj = &*(this as *mut MockContextObject);
    IModel::add_ref(obj.model);
    *out = obj.model;
    S_OK
}

unsafe extern "system" fn context_full_default_params(
    this: *mut IContext,
    strategy: u32,
    out: *mut RawFullParams,
) -> HResult {
    if out.is_null() {
        return E_POINTER;
    }
    let obj = &*(this as *mut MockContextObject);
    let raw = &mut *out;
    *raw = RawFullParams::zeroed();
    raw.strategy = strategy;
    raw.n_max_text_ctx = if obj.poisoned.load(Ordering::SeqCst) {
        // A drifted layout reads back a wrong default.
        512
    } else {
        16384
    };
    raw.flags = (ParamFlags::PRINT_PROGRESS | ParamFlags::PRINT_TIMESTAMPS).0;
    raw.thold_pt = 0.01;
    raw.thold_ptsum = 0.01;
    raw.language = lang::ENGLISH;
    S_OK
}

unsafe extern "system" fn context_timings(_this: *mut IContext) -> HResult {
    S_OK
}

pub(crate) struct MockContext;

impl MockContext {
    /// Make `fullDefaultParams` write a wrong default, as a layout drift
    /// between the local block and the native ABI would.
    pub(crate) fn poison_defaults(context: &ExecutionContext) {
        let obj = unsafe { &*(context.raw_ptr() as *mut MockContextObject) };
        obj.poisoned.store(true, Ordering::SeqCst);
    }

    /// Hand the context the result object its next `getResults` returns.
    pub(crate) fn stage_results(context: &ExecutionContext, results: ResultSet) {
        let obj = unsafe { &*(context.raw_ptr() as *mut MockContextObject) };
        let previous = obj.staged.replace(results.into_raw());
        if !previous.is_null() {
            unsafe { ITranscribeResult::release(previous) };
        }
    }

    pub(crate) fn silent_buffer() -> AudioBuffer {
        MockMedia::decoded_buffer(16_000)
    }
}

// ---------------------------------------------------------------- media ----

#[repr(C)]
struct MockMediaObject {
    iface: IMediaFoundation,
    refs: AtomicU32,
}

static MEDIA_VTBL: IMediaFoundationVtbl = IMediaFoundationVtbl {
    query_interface: 0,
    add_ref: media_add_ref,
    release: media_release,
    load_audio_file: media_load_audio_file,
    open_audio_file: media_open_audio_file,
    load_audio_file_data: media_load_audio_file_data,
    list_capture_devices: 0,
    open_capture_device: 0,
};

unsafe extern "system" fn media_add_ref(this: *mut IMediaFoundation) -> u32 {
    let obj = &*(this as *mut MockMediaObject);
    obj.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn media_release(this: *mut IMediaFoundation) -> u32 {
    let obj = &*(this as *mut MockMediaObject);
    let remaining = obj.refs.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        drop(Box::from_raw(this as *mut MockMediaObject));
    }
    remaining
}

unsafe fn decode_wide(mut ptr: *const u16) -> String {
    let mut units = Vec::new();
    while *ptr != 0 {
        units.push(*ptr);
        ptr = ptr.add(1);
    }
    String::from_utf16_lossy(&units)
}

unsafe extern "system" fn media_load_audio_file(
    _this: *mut IMediaFoundation,
    path: *const u16,
    _stereo: bool,
    out: *mut *mut IAudioBuffer,
) -> HResult {
    if path.is_null() || out.is_null() {
        return E_POINTER;
    }
    if !Path::new(&decode_wide(path)).exists() {
        return E_FAIL;
    }
    *out = alloc_buffer(16_000);
    S_OK
}

unsafe extern "system" fn media_open_audio_file(
    _this: *mut IMediaFoundation,
    path: *const u16,
    _stereo: bool,
    out: *mut *mut IAudioReader,
) -> HResult {
    if path.is_null() || out.is_null() {
        return E_POINTER;
    }
    if !Path::new(&decode_wide(path)).exists() {
        return E_FAIL;
    }
    *out = alloc_reader();
    S_OK
}

unsafe extern "system" fn media_load_audio_file_data(
    _this: *mut IMediaFoundation,
    data: *const c_void,
    size: u64,
    _stereo: bool,
    out: *mut *mut IAudioReader,
) -> HResult {
    if out.is_null() {
        return E_POINTER;
    }
    if data.is_null() || size == 0 {
        return E_INVALIDARG;
    }
    *out = alloc_reader();
    S_OK
}

#[repr(C)]
struct MockBufferObject {
    iface: IAudioBuffer,
    refs: AtomicU32,
    samples: u32,
}

static BUFFER_VTBL: IAudioBufferVtbl = IAudioBufferVtbl {
    query_interface: 0,
    add_ref: buffer_add_ref,
    release: buffer_release,
    count_samples: buffer_count_samples,
    get_pcm_mono: 0,
    get_pcm_stereo: 0,
    get_time: 0,
};

fn alloc_buffer(samples: u32) -> *mut IAudioBuffer {
    let obj = Box::new(MockBufferObject {
        iface: IAudioBuffer {
            vtbl: &BUFFER_VTBL,
        },
        refs: AtomicU32::new(1),
        samples,
    });
    Box::into_raw(obj) as *mut IAudioBuffer
}

unsafe extern "system" fn buffer_add_ref(this: *mut IAudioBuffer) -> u32 {
    let obj = &*(this as *mut MockBufferObject);
    obj.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn buffer_release(this: *mut IAudioBuffer) -> u32 {
    let obj = &*(this as *mut MockBufferObject);
    let remaining = obj.refs.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        drop(Box::from_raw(this as *mut MockBufferObject));
    }
    remaining
}

unsafe extern "system" fn buffer_count_samples(this: *mut IAudioBuffer) -> u32 {
    (*(this as *mut MockBufferObject)).samples
}

#[repr(C)]
struct MockReaderObject {
    iface: IAudioReader,
    refs: AtomicU32,
}

static READER_VTBL: IAudioReaderVtbl = IAudioReaderVtbl {
    query_interface: 0,
    add_ref: reader_add_ref,
    release: reader_release,
    get_duration: reader_get_duration,
    get_reader: 0,
    requested_stereo: 0,
};

fn alloc_reader() -> *mut IAudioReader {
    let obj = Box::new(MockReaderObject {
        iface: IAudioReader {
            vtbl: &READER_VTBL,
        },
        refs: AtomicU32::new(1),
    });
    Box::into_raw(obj) as *mut IAudioReader
}

unsafe extern "system" fn reader_add_ref(this: *mut IAudioReader) -> u32 {
    let obj = &*(this as *mut MockReaderObject);
    obj.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn reader_release(this: *mut IAudioReader) -> u32 {
    let obj = &*(this as *mut MockReaderObject);
    let remaining = obj.refs.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        drop(Box::from_raw(this as *mut MockReaderObject));
    }
    remaining
}

unsafe extern "system" fn reader_get_duration(
    _this: *mut IAudioReader,
    out: *mut i64,
) -> HResult {
    if out.is_null() {
        return E_POINTER;
    }
    // One second at 100 ns per tick.
    *out = 10_000_000;
    S_OK
}

pub(crate) struct MockMedia;

impl MockMedia {
    pub(crate) fn spawn() -> MediaFoundation {
        let obj = Box::new(MockMediaObject {
            iface: IMediaFoundation { vtbl: &MEDIA_VTBL },
            refs: AtomicU32::new(1),
        });
        let ptr = Box::into_raw(obj) as *mut IMediaFoundation;
        MediaFoundation::new(unsafe { ComPtr::from_raw(ptr) }.unwrap())
    }

    pub(crate) fn decoded_buffer(samples: u32) -> AudioBuffer {
        AudioBuffer::new(unsafe { ComPtr::from_raw(alloc_buffer(samples)) }.unwrap())
    }
}

// --------------------------------------------------------------- result ----

#[repr(C)]
struct MockResultObject {
    iface: ITranscribeResult,
    refs: AtomicU32,
    segments: Vec<Segment>,
    tokens: Vec<Token>,
    // Backing storage for the text pointers in `segments` and `tokens`.
    _texts: Vec<CString>,
}

static RESULT_VTBL: ITranscribeResultVtbl = ITranscribeResultVtbl {
    query_interface: 0,
    add_ref: result_add_ref,
    release: result_release,
    get_size: result_get_size,
    get_segments: result_get_segments,
    get_tokens: result_get_tokens,
};

fn alloc_result_from(texts: Vec<CString>, counts: &[u32]) -> *mut ITranscribeResult {
    let mut segments = Vec::new();
    let mut tokens = Vec::new();
    let mut first = 0u32;
    for (text, &count) in texts.iter().zip(counts) {
        let interval = TimeInterval {
            begin: TimeSpan {
                ticks: u64::from(first) * 10_000_000,
            },
            end: TimeSpan {
                ticks: u64::from(first + count) * 10_000_000,
            },
        };
        segments.push(Segment::for_tests(text.as_ptr(), interval, first, count));
        for i in 0..count {
            tokens.push(Token::for_tests(text.as_ptr(), interval, (first + i) as i32));
        }
        first += count;
    }
    let obj = Box::new(MockResultObject {
        iface: ITranscribeResult {
            vtbl: &RESULT_VTBL,
        },
        refs: AtomicU32::new(1),
        segments,
        tokens,
        _texts: texts,
    });
    Box::into_raw(obj) as *mut ITranscribeResult
}

fn alloc_result(spec: &[(&str, u32)]) -> *mut ITranscribeResult {
    let texts = spec
        .iter()
        .map(|(text, _)| CString::new(*text).unwrap())
        .collect();
    let counts: Vec<u32> = spec.iter().map(|(_, count)| *count).collect();
    alloc_result_from(texts, &counts)
}

unsafe extern "system" fn result_add_ref(this: *mut ITranscribeResult) -> u32 {
    let obj = &*(this as *mut MockResultObject);
    obj.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn result_release(this: *mut ITranscribeResult) -> u32 {
    let obj = &*(this as *mut MockResultObject);
    let remaining = obj.refs.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining == 0 {
        drop(Box::from_raw(this as *mut MockResultObject));
    }
    remaining
}

unsafe extern "system" fn result_get_size(
    this: *mut ITranscribeResult,
    out: *mut ResultSize,
) -> HResult {
    if out.is_null() {
        return E_POINTER;
    }
    let obj = &*(this as *mut MockResultObject);
    (*out).count_segments = obj.segments.len() as u32;
    (*out).count_tokens = obj.tokens.len() as u32;
    S_OK
}

unsafe extern "system" fn result_get_segments(this: *mut ITranscribeResult) -> *const Segment {
    (*(this as *mut MockResultObject)).segments.as_ptr()
}

unsafe extern "system" fn result_get_tokens(this: *mut ITranscribeResult) -> *const Token {
    (*(this as *mut MockResultObject)).tokens.as_ptr()
}

pub(crate) struct MockResult;

impl MockResult {
    /// A result set built from `(segment text, token count)` pairs.
    pub(crate) fn with_segments(spec: &[(&str, u32)]) -> ResultSet {
        ResultSet::new(unsafe { ComPtr::from_raw(alloc_result(spec)) }.unwrap())
    }

    /// A single-segment result whose text is not valid UTF-8.
    pub(crate) fn with_invalid_utf8_segment() -> ResultSet {
        let text = CString::new(vec![0xC3, 0x28]).unwrap();
        let ptr = alloc_result_from(vec![text], &[1]);
        ResultSet::new(unsafe { ComPtr::from_raw(ptr) }.unwrap())
    }
}
