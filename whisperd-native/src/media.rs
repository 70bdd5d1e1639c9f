//! Media decoder: native audio decoding objects
//!
//! The decoder turns a file path or a raw byte buffer into a native audio
//! buffer or streaming reader the execution context can consume. Contents
//! are never copied locally; only the object address crosses back over the
//! boundary, so the owning handle must stay alive until the context is done
//! with it.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;

use crate::com::{impl_com_object, ComPtr};
use crate::error::{NativeError, Result};
use crate::status::{self, HResult, E_INVALIDARG, E_POINTER, S_OK};
use crate::wide::wide_path;

#[repr(C)]
pub(crate) struct IMediaFoundation {
    pub(crate) vtbl: *const IMediaFoundationVtbl,
}

#[repr(C)]
pub(crate) struct IMediaFoundationVtbl {
    pub query_interface: usize,
    pub add_ref: unsafe extern "system" fn(*mut IMediaFoundation) -> u32,
    pub release: unsafe extern "system" fn(*mut IMediaFoundation) -> u32,
    pub load_audio_file: unsafe extern "system" fn(
        *mut IMediaFoundation,
        *const u16,
        bool,
        *mut *mut IAudioBuffer,
    ) -> HResult,
    pub open_audio_file: unsafe extern "system" fn(
        *mut IMediaFoundation,
        *const u16,
        bool,
        *mut *mut IAudioReader,
    ) -> HResult,
    pub load_audio_file_data: unsafe extern "system" fn(
        *mut IMediaFoundation,
        *const c_void,
        u64,
        bool,
        *mut *mut IAudioReader,
    ) -> HResult,
    pub list_capture_devices: usize,
    pub open_capture_device: usize,
}

impl_com_object!(IMediaFoundation);

#[derive(Debug)]
#[repr(C)]
pub(crate) struct IAudioBuffer {
    pub(crate) vtbl: *const IAudioBufferVtbl,
}

#[repr(C)]
pub(crate) struct IAudioBufferVtbl {
    pub query_interface: usize,
    pub add_ref: unsafe extern "system" fn(*mut IAudioBuffer) -> u32,
    pub release: unsafe extern "system" fn(*mut IAudioBuffer) -> u32,
    pub count_samples: unsafe extern "system" fn(*mut IAudioBuffer) -> u32,
    pub get_pcm_mono: usize,
    pub get_pcm_stereo: usize,
    pub get_time: usize,
}

impl_com_object!(IAudioBuffer);

#[derive(Debug)]
#[repr(C)]
pub(crate) struct IAudioReader {
    pub(crate) vtbl: *const IAudioReaderVtbl,
}

#[repr(C)]
pub(crate) struct IAudioReaderVtbl {
    pub query_interface: usize,
    pub add_ref: unsafe extern "system" fn(*mut IAudioReader) -> u32,
    pub release: unsafe extern "system" fn(*mut IAudioReader) -> u32,
    pub get_duration: unsafe extern "system" fn(*mut IAudioReader, *mut i64) -> HResult,
    pub get_reader: usize,
    pub requested_stereo: usize,
}

impl_com_object!(IAudioReader);

/// Owned handle to the native media decoding object.
pub struct MediaFoundation {
    raw: ComPtr<IMediaFoundation>,
}

unsafe impl Send for MediaFoundation {}

impl MediaFoundation {
    pub(crate) fn new(raw: ComPtr<IMediaFoundation>) -> Self {
        Self { raw }
    }

    /// Decode a whole audio file into a native buffer.
    pub fn load_file(&self, path: &Path, stereo: bool) -> Result<AudioBuffer> {
        let wide = wide_path(path.as_os_str());
        let mut out: *mut IAudioBuffer = std::ptr::null_mut();
        let hr = unsafe {
            ((*(*self.raw.as_ptr()).vtbl).load_audio_file)(
                self.raw.as_ptr(),
                wide.as_ptr(),
                stereo,
                &mut out,
            )
        };
        if hr != S_OK {
            return Err(NativeError::decode("loadAudioFile", hr));
        }
        unsafe { ComPtr::from_raw(out) }
            .map(|raw| AudioBuffer { raw })
            .ok_or(NativeError::decode("loadAudioFile", E_POINTER))
    }

    /// Open an audio file for streamed consumption without decoding it yet.
    pub fn open_file(&self, path: &Path, stereo: bool) -> Result<AudioReader<'static>> {
        let wide = wide_path(path.as_os_str());
        let mut out: *mut IAudioReader = std::ptr::null_mut();
        let hr = unsafe {
            ((*(*self.raw.as_ptr()).vtbl).open_audio_file)(
                self.raw.as_ptr(),
                wide.as_ptr(),
                stereo,
                &mut out,
            )
        };
        if hr != S_OK {
            return Err(NativeError::decode("openAudioFile", hr));
        }
        unsafe { ComPtr::from_raw(out) }
            .map(AudioReader::new)
            .ok_or(NativeError::decode("openAudioFile", E_POINTER))
    }

    /// Build a streaming reader over an in-memory audio container.
    ///
    /// The native side reads from `data` for the life of the reader, so the
    /// returned handle borrows the slice.
    pub fn load_bytes<'a>(&self, data: &'a [u8], stereo: bool) -> Result<AudioReader<'a>> {
        if data.is_empty() {
            return Err(NativeError::decode("loadAudioFileData", E_INVALIDARG));
        }

        let mut out: *mut IAudioReader = std::ptr::null_mut();
        let hr = unsafe {
            ((*(*self.raw.as_ptr()).vtbl).load_audio_file_data)(
                self.raw.as_ptr(),
                data.as_ptr().cast(),
                data.len() as u64,
                stereo,
                &mut out,
            )
        };
        if hr != S_OK {
            return Err(NativeError::decode("loadAudioFileData", hr));
        }
        unsafe { ComPtr::from_raw(out) }
            .map(AudioReader::new)
            .ok_or(NativeError::decode("loadAudioFileData", E_POINTER))
    }
}

/// Owned handle to a fully decoded native audio buffer.
#[derive(Debug)]
pub struct AudioBuffer {
    raw: ComPtr<IAudioBuffer>,
}

unsafe impl Send for AudioBuffer {}

impl AudioBuffer {
    #[cfg(test)]
    pub(crate) fn new(raw: ComPtr<IAudioBuffer>) -> Self {
        Self { raw }
    }

    pub fn count_samples(&self) -> u32 {
        unsafe { ((*(*self.raw.as_ptr()).vtbl).count_samples)(self.raw.as_ptr()) }
    }

    pub(crate) fn as_ptr(&self) -> *const IAudioBuffer {
        self.raw.as_ptr()
    }
}

/// Owned handle to a native streaming audio reader.
///
/// The lifetime ties the reader to the byte buffer it reads from (readers
/// opened from a file carry `'static`).
#[derive(Debug)]
pub struct AudioReader<'a> {
    raw: ComPtr<IAudioReader>,
    _source: PhantomData<&'a [u8]>,
}

impl<'a> AudioReader<'a> {
    pub(crate) fn new(raw: ComPtr<IAudioReader>) -> Self {
        Self {
            raw,
            _source: PhantomData,
        }
    }

    /// Total duration of the underlying media (100 ns tick resolution).
    pub fn duration(&self) -> Result<Duration> {
        let mut ticks: i64 = 0;
        let hr =
            unsafe { ((*(*self.raw.as_ptr()).vtbl).get_duration)(self.raw.as_ptr(), &mut ticks) };
        status::check("getDuration", hr)?;
        Ok(Duration::from_nanos((ticks.max(0) as u64).saturating_mul(100)))
    }

    pub(crate) fn as_ptr(&self) -> *const IAudioReader {
        self.raw.as_ptr()
    }
}
