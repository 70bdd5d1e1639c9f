//! Model handle and setup descriptor
//!
//! A loaded model is an expensive, reference-counted native object. Handles
//! are cheap to clone (a clone is a fresh native reference to the same
//! resource) and every execution context is created from exactly one model.

use std::ops::{BitOr, BitOrAssign};

use crate::com::{impl_com_object, ComPtr};
use crate::context::{ExecutionContext, IContext};
use crate::error::{NativeError, Result};
use crate::status::{self, HResult, Outcome, E_POINTER, S_OK};
use crate::wide::wide;

/// Which native implementation backs the model.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelImplementation {
    /// GPGPU implementation based on Direct3D 11 compute shaders. The only
    /// one compiled into published builds of the library.
    Gpu = 1,
    /// DirectCompute encode with CPU decode. Not in published builds.
    Hybrid = 2,
    /// Reference GGML CPU implementation. Not in published builds.
    Reference = 3,
}

/// GPU behavior flags of the model setup descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GpuModelFlags(pub u32);

impl GpuModelFlags {
    pub const NONE: GpuModelFlags = GpuModelFlags(0);
    /// Use Wave32 compute shaders even on AMD GPUs.
    pub const WAVE32: GpuModelFlags = GpuModelFlags(1);
    /// Use Wave64 compute shaders even on nVidia and Intel GPUs.
    pub const WAVE64: GpuModelFlags = GpuModelFlags(2);
    pub const NO_RESHAPED_MAT_MUL: GpuModelFlags = GpuModelFlags(4);
    pub const USE_RESHAPED_MAT_MUL: GpuModelFlags = GpuModelFlags(8);
    /// Create GPU tensors in a way that allows sharing across devices, which
    /// is what makes the model handle cloneable.
    pub const CLONEABLE: GpuModelFlags = GpuModelFlags(0x10);

    pub fn contains(self, flag: GpuModelFlags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl BitOr for GpuModelFlags {
    type Output = GpuModelFlags;

    fn bitor(self, rhs: GpuModelFlags) -> GpuModelFlags {
        GpuModelFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for GpuModelFlags {
    fn bitor_assign(&mut self, rhs: GpuModelFlags) {
        self.0 |= rhs.0;
    }
}

/// Setup descriptor handed to the `loadModel` entry point.
#[derive(Debug, Clone)]
pub struct ModelSetup {
    pub implementation: ModelImplementation,
    pub flags: GpuModelFlags,
    /// Substring of the GPU adapter name to load on, if any.
    pub adapter: Option<String>,
}

impl ModelSetup {
    /// Descriptor used by the model cache: GPU implementation, cloneable so
    /// cache hits can hand out independent references.
    pub fn cloneable_gpu(adapter: Option<&str>) -> Self {
        Self {
            implementation: ModelImplementation::Gpu,
            flags: GpuModelFlags::CLONEABLE,
            adapter: adapter.map(str::to_owned),
        }
    }

    pub fn is_cloneable(&self) -> bool {
        self.flags.contains(GpuModelFlags::CLONEABLE)
    }

    pub(crate) fn adapter_wide(&self) -> Option<Vec<u16>> {
        self.adapter.as_deref().map(wide)
    }

    /// Build the fixed-layout view. `adapter` must be the buffer returned by
    /// [`Self::adapter_wide`] and must outlive the native call.
    pub(crate) fn as_raw(&self, adapter: Option<&[u16]>) -> RawModelSetup {
        RawModelSetup {
            implementation: self.implementation as u32,
            flags: self.flags.0,
            adapter: adapter.map_or(std::ptr::null(), <[u16]>::as_ptr),
        }
    }
}

/// Byte-for-byte mirror of the native `sModelSetup` structure.
#[repr(C)]
pub(crate) struct RawModelSetup {
    implementation: u32,
    flags: u32,
    adapter: *const u16,
}

#[derive(Debug)]
#[repr(C)]
pub(crate) struct IModel {
    pub(crate) vtbl: *const IModelVtbl,
}

/// Method slots of the native model object, in fixed vtable order. Slots this
/// crate never calls are held as opaque addresses.
#[repr(C)]
pub(crate) struct IModelVtbl {
    pub query_interface: usize,
    pub add_ref: unsafe extern "system" fn(*mut IModel) -> u32,
    pub release: unsafe extern "system" fn(*mut IModel) -> u32,
    pub create_context: unsafe extern "system" fn(*mut IModel, *mut *mut IContext) -> HResult,
    pub tokenize: usize,
    pub is_multilingual: unsafe extern "system" fn(*mut IModel) -> HResult,
    pub get_special_tokens: usize,
    pub string_from_token: usize,
    pub clone_model: unsafe extern "system" fn(*mut IModel, *mut *mut IModel) -> HResult,
}

impl_com_object!(IModel);

/// Owned handle to a loaded native model.
#[derive(Debug)]
pub struct Model {
    raw: ComPtr<IModel>,
    setup: ModelSetup,
}

// The native model object is immutable once loaded; all mutation happens in
// execution contexts created from it.
unsafe impl Send for Model {}
unsafe impl Sync for Model {}

impl Model {
    pub(crate) fn new(raw: ComPtr<IModel>, setup: ModelSetup) -> Self {
        Self { raw, setup }
    }

    pub fn setup(&self) -> &ModelSetup {
        &self.setup
    }

    /// Allocate a fresh native transcription session for this model.
    ///
    /// Sessions are never cached; every call creates a new native object.
    pub fn create_context(&self) -> Result<ExecutionContext> {
        let mut out: *mut IContext = std::ptr::null_mut();
        let hr = unsafe { ((*(*self.raw.as_ptr()).vtbl).create_context)(self.raw.as_ptr(), &mut out) };
        status::check("createContext", hr)?;

        let raw = unsafe { ComPtr::from_raw(out) }
            .ok_or(NativeError::call("createContext", E_POINTER))?;
        Ok(ExecutionContext::new(raw, self.setup.clone()))
    }

    /// Whether the loaded model supports languages other than English.
    pub fn is_multilingual(&self) -> bool {
        let hr = unsafe { ((*(*self.raw.as_ptr()).vtbl).is_multilingual)(self.raw.as_ptr()) };
        hr == S_OK
    }

    /// Duplicate the handle by acquiring a new native reference to the same
    /// underlying resource.
    ///
    /// Fails with [`NativeError::NotCloneable`] when the setup did not
    /// request clonability.
    pub fn try_clone(&self) -> Result<Model> {
        if !self.setup.is_cloneable() {
            return Err(NativeError::NotCloneable);
        }

        let mut out: *mut IModel = std::ptr::null_mut();
        let hr = unsafe { ((*(*self.raw.as_ptr()).vtbl).clone_model)(self.raw.as_ptr(), &mut out) };
        if let Outcome::Declined = status::check("iModel.clone", hr)? {
            return Err(NativeError::call("iModel.clone", hr));
        }

        let raw =
            unsafe { ComPtr::from_raw(out) }.ok_or(NativeError::call("iModel.clone", E_POINTER))?;
        Ok(Model::new(raw, self.setup.clone()))
    }
}
