//! Reference-count discipline for native objects
//!
//! Every object handed out by the library is a pointer whose first field is a
//! virtual-dispatch table starting with the canonical
//! `QueryInterface`/`AddRef`/`Release` triple. [`ComPtr`] is the scoped
//! ownership guard for one acquired reference: it releases exactly once on
//! every exit path, and the raw address never escapes above this layer.

use std::ptr::NonNull;

/// A native object kind whose vtable carries the refcount slots.
pub(crate) trait ComObject {
    /// # Safety
    /// `this` must point at a live native object of this kind.
    unsafe fn add_ref(this: *mut Self) -> u32;

    /// # Safety
    /// `this` must point at a live native object of this kind, and the
    /// reference being given up must still be owned by the caller.
    unsafe fn release(this: *mut Self) -> u32;
}

/// Implements [`ComObject`] for an interface struct by dispatching through
/// its vtable field.
macro_rules! impl_com_object {
    ($iface:ty) => {
        impl $crate::com::ComObject for $iface {
            unsafe fn add_ref(this: *mut Self) -> u32 {
                ((*(*this).vtbl).add_ref)(this)
            }

            unsafe fn release(this: *mut Self) -> u32 {
                ((*(*this).vtbl).release)(this)
            }
        }
    };
}
pub(crate) use impl_com_object;

/// Owner of exactly one native reference.
#[derive(Debug)]
pub(crate) struct ComPtr<T: ComObject> {
    ptr: NonNull<T>,
}

impl<T: ComObject> ComPtr<T> {
    /// Take ownership of one already-acquired reference.
    ///
    /// Returns `None` for a null pointer so out-parameter results that the
    /// native side left unset do not turn into dangling handles.
    ///
    /// # Safety
    /// `ptr` must be null or a live object reference owned by the caller.
    pub unsafe fn from_raw(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Give up ownership without releasing the reference.
    #[cfg(test)]
    pub fn into_raw(self) -> *mut T {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    /// Acquire an additional reference to the same object.
    pub fn clone_ref(&self) -> Self {
        unsafe {
            T::add_ref(self.ptr.as_ptr());
        }
        Self { ptr: self.ptr }
    }
}

impl<T: ComObject> Drop for ComPtr<T> {
    fn drop(&mut self) {
        unsafe {
            T::release(self.ptr.as_ptr());
        }
    }
}
