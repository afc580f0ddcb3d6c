//! Ownership-carrying wrappers around native handles.
//!
//! An `Obj` pins exactly one count unit of a native object for as long as
//! the wrapper is alive. The unit is given back once: by an explicit
//! `release()`, by `into_raw()` handing it to native code, or by `Drop`.
//! Under `ReleasePolicy::Deferred` the drop path only queues the handle, so
//! cleanup is eventual; use `release()` or `Scoped` when the native side
//! must see the decrement before the call returns.
//!
//! Every typed wrapper (`Str`, `TrappedErr`, `Hash`, ...) is an `Obj` with a
//! different name. Share one between owners with `Arc`, or `clone()` it to
//! take a second count unit. `release()` needs exclusive access, so a shared
//! wrapper gives its unit back only once the last owner is done with it.

use crate::error::BridgeError;
use crate::host::Runtime;
use crate::runtime::ObjPtr;
use std::fmt;
use std::hash::{Hash as StdHash, Hasher};
use std::ops::Deref;

pub struct Obj {
    handle: ObjPtr,
    rt: &'static Runtime,
}

impl Obj {
    /// Take over one count unit already attributed to `ptr`.
    ///
    /// # Safety
    /// `ptr` must be a live handle from `rt`'s object system, and the caller
    /// must be transferring (not lending) one count unit.
    pub unsafe fn adopt(rt: &'static Runtime, ptr: ObjPtr) -> Result<Self, BridgeError> {
        if ptr.is_null() {
            return Err(BridgeError::NullHandle);
        }
        Ok(unsafe { Self::adopt_unchecked(rt, ptr) })
    }

    /// Like `adopt`, for handles that may be null.
    ///
    /// # Safety
    /// A non-null `ptr` must satisfy `adopt`'s contract.
    pub unsafe fn from_raw(rt: &'static Runtime, ptr: ObjPtr) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        Some(unsafe { Self::adopt_unchecked(rt, ptr) })
    }

    /// Wrap a lent handle by taking a fresh count unit for the wrapper.
    ///
    /// # Safety
    /// `ptr` must be a live handle from `rt`'s object system.
    pub unsafe fn inc_ref(rt: &'static Runtime, ptr: ObjPtr) -> Result<Self, BridgeError> {
        if ptr.is_null() {
            return Err(BridgeError::NullHandle);
        }
        let ptr = unsafe { rt.system().inc_refcount(ptr) };
        Ok(unsafe { Self::adopt_unchecked(rt, ptr) })
    }

    /// # Safety
    /// Same as `adopt`; a null `ptr` yields an already-released wrapper.
    pub(crate) unsafe fn adopt_unchecked(rt: &'static Runtime, ptr: ObjPtr) -> Self {
        debug_assert!(!ptr.is_null(), "adopting a null native handle");
        Self { handle: ptr, rt }
    }

    /// The raw handle, for passing into native calls. No ownership moves;
    /// null once released.
    #[inline]
    pub fn to_ptr(&self) -> ObjPtr {
        self.handle
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.to_ptr().is_null()
    }

    pub fn runtime(&self) -> &'static Runtime {
        self.rt
    }

    fn take(&mut self) -> ObjPtr {
        std::mem::replace(&mut self.handle, ObjPtr::null())
    }

    /// Give the count unit back now, whatever the release policy. Returns
    /// false if it had already been given back.
    ///
    /// A wrapper shared through `Arc` cannot be released while other owners
    /// may still be using the handle:
    ///
    /// ```compile_fail
    /// use std::sync::Arc;
    ///
    /// fn release_shared(obj: Arc<cfish_bridge::Obj>) -> bool {
    ///     obj.release()
    /// }
    /// ```
    pub fn release(&mut self) -> bool {
        let handle = self.take();
        if handle.is_null() {
            return false;
        }
        self.rt.release_handle(handle);
        true
    }

    /// Hand the count unit to the caller (typically native code) without
    /// releasing it.
    pub fn into_raw(mut self) -> ObjPtr {
        self.take()
    }

    /// Class name of the wrapped object, empty once released.
    pub fn class_name(&self) -> String {
        let handle = self.to_ptr();
        if handle.is_null() {
            return String::new();
        }
        unsafe { self.rt.system().class_name(handle) }
    }
}

impl Drop for Obj {
    fn drop(&mut self) {
        let handle = self.take();
        if !handle.is_null() {
            self.rt.dispose(handle);
        }
    }
}

impl Clone for Obj {
    /// A new wrapper owning its own count unit.
    fn clone(&self) -> Self {
        let handle = if self.handle.is_null() {
            ObjPtr::null()
        } else {
            unsafe { self.rt.system().inc_refcount(self.handle) }
        };
        Self {
            handle,
            rt: self.rt,
        }
    }
}

impl PartialEq for Obj {
    fn eq(&self, other: &Self) -> bool {
        self.to_ptr() == other.to_ptr()
    }
}

impl Eq for Obj {}

impl StdHash for Obj {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_ptr().hash(state);
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj({:p})", self.to_ptr())
    }
}

/// Shared base shape of every wrapper kind.
pub trait NativeObj {
    fn as_obj(&self) -> &Obj;

    fn as_obj_mut(&mut self) -> &mut Obj;

    #[inline]
    fn to_ptr(&self) -> ObjPtr {
        self.as_obj().to_ptr()
    }
}

impl NativeObj for Obj {
    fn as_obj(&self) -> &Obj {
        self
    }

    fn as_obj_mut(&mut self) -> &mut Obj {
        self
    }
}

/// Declare typed wrappers sharing `Obj`'s lifecycle.
macro_rules! native_wrapper {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {$(
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name {
            obj: $crate::obj::Obj,
        }

        impl $name {
            /// Take over one count unit already attributed to `ptr`.
            ///
            /// # Safety
            /// See [`Obj::adopt`](crate::obj::Obj::adopt).
            pub unsafe fn adopt(
                rt: &'static $crate::host::Runtime,
                ptr: $crate::runtime::ObjPtr,
            ) -> Result<Self, $crate::error::BridgeError> {
                Ok(Self {
                    obj: unsafe { $crate::obj::Obj::adopt(rt, ptr)? },
                })
            }

            /// # Safety
            /// See [`Obj::from_raw`](crate::obj::Obj::from_raw).
            pub unsafe fn from_raw(
                rt: &'static $crate::host::Runtime,
                ptr: $crate::runtime::ObjPtr,
            ) -> Option<Self> {
                unsafe { $crate::obj::Obj::from_raw(rt, ptr) }.map(Self::from_obj)
            }

            /// Caller vouches that `obj` really is this kind.
            pub fn from_obj(obj: $crate::obj::Obj) -> Self {
                Self { obj }
            }

            pub fn into_obj(self) -> $crate::obj::Obj {
                self.obj
            }

            pub fn into_raw(self) -> $crate::runtime::ObjPtr {
                self.obj.into_raw()
            }

            pub fn release(&mut self) -> bool {
                self.obj.release()
            }
        }

        impl $crate::obj::NativeObj for $name {
            fn as_obj(&self) -> &$crate::obj::Obj {
                &self.obj
            }

            fn as_obj_mut(&mut self) -> &mut $crate::obj::Obj {
                &mut self.obj
            }
        }
    )*};
}

pub(crate) use native_wrapper;

native_wrapper!(Hash, Vector, ByteBuf, Class, Method, LockFreeRegistry);

/// Scoped ownership: the count unit is released when the guard goes out of
/// scope, including during unwinding, whatever the release policy.
pub struct Scoped<T: NativeObj> {
    inner: T,
}

impl<T: NativeObj> Scoped<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: NativeObj> Deref for Scoped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: NativeObj> Drop for Scoped<T> {
    fn drop(&mut self) {
        self.inner.as_obj_mut().release();
    }
}

/// Run `f` with `obj`, releasing it before returning.
pub fn with_scoped<T: NativeObj, R>(obj: T, f: impl FnOnce(&T) -> R) -> R {
    let scoped = Scoped::new(obj);
    f(&scoped)
}
