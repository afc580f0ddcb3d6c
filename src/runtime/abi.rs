//! Native object system contract
//!
//! The native object system owns every object and counts references to it.
//! Rust code only ever sees address-sized handles to those objects and calls
//! back into the native side through the `ObjectSystem` trait.
//!
//! Two host functions flow the other way: `raise` and `trap`. Native code
//! cannot see symbols defined on the Rust side, so they are handed over as
//! plain function pointers in `Hooks` when the object system is booted.
//!
//! Calling convention:
//! - Handles are passed as `ObjPtr` (a bare pointer, FFI-safe)
//! - Hooks use the `C-unwind` ABI because `raise` unwinds through native frames
//! - Ownership of a count unit is always explicit in the method docs

use libc::c_void;
use std::fmt;

/// An opaque handle to a native object.
///
/// This is a wrapper around a raw pointer that:
/// - Is meaningful only to the native object system
/// - Can be converted to/from usize for identity checks and logging
/// - Carries no ownership by itself (see `crate::obj::Obj` for that)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjPtr {
    ptr: *mut c_void,
}

// SAFETY: ObjPtr is an address. The native contract requires its refcount
// primitive to be atomic, so handles may be shared between threads.
unsafe impl Send for ObjPtr {}
unsafe impl Sync for ObjPtr {}

impl ObjPtr {
    /// Create an ObjPtr from a raw pointer.
    #[inline]
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self { ptr }
    }

    /// Create an ObjPtr from a usize.
    #[inline]
    pub fn from_usize(addr: usize) -> Self {
        Self {
            ptr: addr as *mut c_void,
        }
    }

    /// Get the raw pointer.
    #[inline]
    pub fn as_ptr(self) -> *mut c_void {
        self.ptr
    }

    /// Get as usize.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.ptr as usize
    }

    /// Create a null handle.
    #[inline]
    pub const fn null() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
        }
    }

    /// Check if null.
    #[inline]
    pub fn is_null(self) -> bool {
        self.ptr.is_null()
    }

    /// Cast to a typed pointer.
    #[inline]
    pub fn cast<T>(self) -> *mut T {
        self.ptr.cast()
    }
}

impl fmt::Debug for ObjPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjPtr({:p})", self.ptr)
    }
}

impl fmt::Pointer for ObjPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.ptr, f)
    }
}

// =========================================================================
// Host hooks
// =========================================================================

/// A native routine run under `trap`, receiving an opaque context pointer.
pub type AttemptFn = unsafe extern "C-unwind" fn(context: *mut c_void);

/// Raise a native error object into Rust control flow. Never returns.
///
/// The callee takes over one count unit of `err`.
pub type RaiseFn = extern "C-unwind" fn(err: ObjPtr) -> !;

/// Run `routine(context)`, returning an owned error handle if it raised and
/// null if it completed normally.
pub type TrapFn = unsafe extern "C-unwind" fn(routine: AttemptFn, context: *mut c_void) -> ObjPtr;

/// Host implementations injected into the object system at boot.
#[derive(Clone, Copy)]
pub struct Hooks {
    pub raise: RaiseFn,
    pub trap: TrapFn,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("raise", &(self.raise as *const ()))
            .field("trap", &(self.trap as *const ()))
            .finish()
    }
}

// =========================================================================
// Object system
// =========================================================================

/// The fixed surface the native object system exposes to this crate.
///
/// Unless stated otherwise, handles passed in are borrowed and handles
/// returned carry one count unit owned by the caller.
pub trait ObjectSystem: Send + Sync + 'static {
    /// Version of the hook contract this object system was built against.
    fn abi_version(&self) -> u32;

    /// One-time initialization. Must run before any other entry point; the
    /// hooks are what native code calls to raise and trap errors.
    fn boot(&self, hooks: Hooks);

    /// Atomically add one count unit. Returns `obj` for chaining.
    ///
    /// # Safety
    /// `obj` must be null or a live handle from this object system.
    unsafe fn inc_refcount(&self, obj: ObjPtr) -> ObjPtr;

    /// Atomically drop one count unit, destroying the object at zero.
    /// Returns the remaining count.
    ///
    /// # Safety
    /// `obj` must be null or a live handle and the caller must own the unit.
    unsafe fn dec_refcount(&self, obj: ObjPtr) -> u32;

    /// Build a string object, taking ownership of `bytes`. May raise if the
    /// bytes are not valid UTF-8.
    fn str_new_steal_utf8(&self, bytes: Box<[u8]>) -> ObjPtr;

    /// Build an error object around `mess`, taking over its count unit.
    ///
    /// # Safety
    /// `mess` must be a live string handle owned by the caller.
    unsafe fn err_new(&self, mess: ObjPtr) -> ObjPtr;

    /// Borrow the message of an error object. Null for non-errors.
    ///
    /// # Safety
    /// `err` must be a live handle.
    unsafe fn err_get_mess(&self, err: ObjPtr) -> ObjPtr;

    /// True when `obj` is a String or a subtype of it.
    ///
    /// # Safety
    /// `obj` must be a live handle.
    unsafe fn is_string(&self, obj: ObjPtr) -> bool;

    /// Produce a String-kind view of any object. May raise.
    ///
    /// # Safety
    /// `obj` must be a live handle.
    unsafe fn to_string(&self, obj: ObjPtr) -> ObjPtr;

    /// Raw UTF-8 bytes of a string object, valid while `s` is alive.
    ///
    /// # Safety
    /// `s` must be a live String-kind handle.
    unsafe fn str_bytes(&self, s: ObjPtr) -> (*const u8, usize);

    /// Class name of `obj`, for diagnostics.
    ///
    /// # Safety
    /// `obj` must be a live handle.
    unsafe fn class_name(&self, obj: ObjPtr) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obj_ptr_roundtrip() {
        let addr: usize = 0x1234_5678_9ABC;
        let ptr = ObjPtr::from_usize(addr);
        assert_eq!(ptr.as_usize(), addr);
        assert!(!ptr.is_null());
    }

    #[test]
    fn test_null_handle() {
        let ptr = ObjPtr::null();
        assert!(ptr.is_null());
        assert_eq!(ptr.as_usize(), 0);
        assert_eq!(ptr, ObjPtr::from_ptr(std::ptr::null_mut()));
    }

    #[test]
    fn test_debug_format() {
        let ptr = ObjPtr::from_usize(0x10);
        assert_eq!(format!("{:?}", ptr), "ObjPtr(0x10)");
    }
}
