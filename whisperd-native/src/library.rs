//! Library loader
//!
//! Locates and loads the native library exactly once per process, resolves
//! the flat entry points (`setupLogger`, `loadModel`, `initMediaFoundation`),
//! gates on the library's file version, and installs the logger bridge. The
//! handle is a process-lifetime singleton: the first caller performs the
//! work, later callers observe the completed result, and a failed
//! initialization leaves nothing half-built behind.

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::com::ComPtr;
use crate::error::{NativeError, Result};
use crate::logger::{self, LoggerSetup};
use crate::media::{IMediaFoundation, MediaFoundation};
use crate::model::{IModel, Model, ModelSetup, RawModelSetup};
use crate::status::{self, HResult, E_POINTER};
use crate::version::{self, LibraryVersion};
use crate::wide::wide_path;

/// Platform name the library is looked up under when no explicit path is
/// given. The library is searched in the working directory first, then the
/// platform loader paths.
#[cfg(windows)]
pub const DEFAULT_LIBRARY_NAME: &str = "Whisper.dll";
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAME: &str = "libwhisper.dylib";
#[cfg(not(any(windows, target_os = "macos")))]
pub const DEFAULT_LIBRARY_NAME: &str = "libwhisper.so";

/// Oldest library version with a compatible vtable layout.
pub const MIN_SUPPORTED: (u16, u16) = (1, 9);

type SetupLoggerFn = unsafe extern "system" fn(*const LoggerSetup) -> HResult;
type LoadModelFn = unsafe extern "system" fn(
    *const u16,
    *const RawModelSetup,
    *const c_void,
    *mut *mut IModel,
) -> HResult;
type InitMediaFoundationFn = unsafe extern "system" fn(*mut *mut IMediaFoundation) -> HResult;

static LIBRARY: OnceCell<NativeLibrary> = OnceCell::new();

/// Load the native library from the default name, or return the
/// already-initialized handle.
pub fn load() -> Result<&'static NativeLibrary> {
    load_from(Path::new(DEFAULT_LIBRARY_NAME))
}

/// Load the native library from an explicit path.
///
/// Idempotent: once any load has succeeded, every later call returns the
/// existing handle regardless of the path argument.
pub fn load_from(path: &Path) -> Result<&'static NativeLibrary> {
    LIBRARY.get_or_try_init(|| NativeLibrary::open(path))
}

/// Process-wide handle to the loaded native library.
#[derive(Debug)]
pub struct NativeLibrary {
    // Keeps the shared object mapped for the life of the process; the raw
    // entry point pointers below are only valid while this is alive.
    _lib: libloading::Library,
    version: Option<LibraryVersion>,
    load_model: LoadModelFn,
    init_media_foundation: InitMediaFoundationFn,
    models: ModelCache,
}

impl NativeLibrary {
    fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NativeError::LibraryNotFound(path.to_owned()));
        }

        let version = version::query(path)?;
        if let Some(found) = version {
            if !found.at_least(MIN_SUPPORTED.0, MIN_SUPPORTED.1) {
                return Err(NativeError::UnsupportedVersion { found });
            }
            debug!(version = %found, "native library version accepted");
        } else {
            debug!("native library carries no readable version, skipping gate");
        }

        let lib = unsafe { libloading::Library::new(path) }
            .map_err(|e| NativeError::LibraryLoad(e.to_string()))?;

        let setup_logger: SetupLoggerFn = unsafe {
            *lib.get(b"setupLogger\0")
                .map_err(|_| NativeError::EntryPointMissing("setupLogger"))?
        };
        let load_model: LoadModelFn = unsafe {
            *lib.get(b"loadModel\0")
                .map_err(|_| NativeError::EntryPointMissing("loadModel"))?
        };
        let init_media_foundation: InitMediaFoundationFn = unsafe {
            *lib.get(b"initMediaFoundation\0")
                .map_err(|_| NativeError::EntryPointMissing("initMediaFoundation"))?
        };

        // Install the logger bridge before any other call so load-time
        // diagnostics from the library are not lost.
        let setup = logger::tracing_setup(logger::LOG_LEVEL_DEBUG);
        let hr = unsafe { setup_logger(&setup) };
        status::check("setupLogger", hr)?;

        info!(path = %path.display(), "native library loaded");
        Ok(Self {
            _lib: lib,
            version,
            load_model,
            init_media_foundation,
            models: ModelCache::new(),
        })
    }

    /// File version reported by the library, when the platform exposes one.
    pub fn version(&self) -> Option<LibraryVersion> {
        self.version
    }

    /// Whether this build of the library tolerates concurrent contexts over
    /// cloned models (introduced in 1.10).
    pub fn supports_multi_thread(&self) -> bool {
        self.version.is_some_and(|v| v.at_least(1, 10))
    }

    /// Load a model, reusing the process-wide cache.
    ///
    /// Models are cached keyed by `(adapter, path)`. Both a cache hit and the
    /// handle returned on a miss are independent native references: dropping
    /// one caller's handle never invalidates another's, and the cache entry
    /// itself stays alive for the process.
    pub fn load_model(&self, path: &str, adapter: Option<&str>) -> Result<Model> {
        self.models.get_or_load(path, adapter, |setup| {
            let wide = wide_path(Path::new(path).as_os_str());
            let adapter_wide = setup.adapter_wide();
            let raw_setup = setup.as_raw(adapter_wide.as_deref());

            let mut out: *mut IModel = std::ptr::null_mut();
            let hr = unsafe {
                (self.load_model)(wide.as_ptr(), &raw_setup, std::ptr::null(), &mut out)
            };
            status::check("loadModel", hr)?;

            let raw = unsafe { ComPtr::from_raw(out) }
                .ok_or(NativeError::call("loadModel", E_POINTER))?;
            info!(path, adapter = adapter.unwrap_or(""), "model loaded");
            Ok(Model::new(raw, setup.clone()))
        })
    }

    /// Initialize the native media decoding object.
    pub fn init_media_foundation(&self) -> Result<MediaFoundation> {
        let mut out: *mut IMediaFoundation = std::ptr::null_mut();
        let hr = unsafe { (self.init_media_foundation)(&mut out) };
        status::check("initMediaFoundation", hr)?;

        unsafe { ComPtr::from_raw(out) }
            .map(MediaFoundation::new)
            .ok_or(NativeError::call("initMediaFoundation", E_POINTER))
    }
}

/// Process-wide model cache keyed by `(adapter, path)`.
///
/// Entries are loaded cloneable; lookups hand out clones so the cached
/// reference can never be released out from under another caller.
#[derive(Debug)]
pub(crate) struct ModelCache {
    entries: Mutex<HashMap<(String, String), Model>>,
}

impl ModelCache {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get_or_load(
        &self,
        path: &str,
        adapter: Option<&str>,
        loader: impl FnOnce(&ModelSetup) -> Result<Model>,
    ) -> Result<Model> {
        let key = (adapter.unwrap_or("").to_owned(), path.to_owned());
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(existing) = entries.get(&key) {
            debug!(path, "model cache hit");
            return existing.try_clone();
        }

        let setup = ModelSetup::cloneable_gpu(adapter);
        let model = loader(&setup)?;
        let handle = model.try_clone()?;
        entries.insert(key, model);
        Ok(handle)
    }
}
