//! Host functions callable from native code
//!
//! These are the concrete implementations behind `Hooks`. The object system
//! receives them once, in `ObjectSystem::boot`, and calls through them to:
//! - Raise a native error into Rust control flow
//! - Run a native routine with errors trapped into a return value
//!
//! The calling convention is:
//! - Handles passed as `ObjPtr`
//! - `C-unwind` ABI, since `cfish_host_raise` unwinds through native frames
//! - A returned error handle carries one count unit owned by the caller

use super::abi::{AttemptFn, Hooks, ObjPtr};
use crate::err::{TrappedErr, raise, trap};
use crate::host::Runtime;
use libc::c_void;

/// Raise a native error. Takes over one count unit of `err`.
#[unsafe(no_mangle)]
pub extern "C-unwind" fn cfish_host_raise(err: ObjPtr) -> ! {
    let rt = match Runtime::current() {
        Ok(rt) => rt,
        Err(e) => panic!("native error {:?} raised with no runtime: {}", err, e),
    };
    match unsafe { TrappedErr::adopt(rt, err) } {
        Ok(err) => raise(err),
        Err(e) => panic!("native code raised an invalid error: {}", e),
    }
}

/// Run `routine(context)`, trapping any raised native error.
///
/// Returns null on normal completion, or the error handle with its count
/// unit transferred to the caller. Panics that are not native errors keep
/// unwinding.
///
/// # Safety
/// `routine` must be safe to call with `context`.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn cfish_host_trap(routine: AttemptFn, context: *mut c_void) -> ObjPtr {
    match trap(|| unsafe { cfish_run_routine(routine, context) }) {
        Ok(()) => ObjPtr::null(),
        Err(err) => err.into_raw(),
    }
}

/// Trampoline invoking an opaque native callback with its context.
///
/// # Safety
/// `routine` must be safe to call with `context`.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn cfish_run_routine(routine: AttemptFn, context: *mut c_void) {
    unsafe { routine(context) }
}

/// The host hooks handed to the object system at boot.
pub fn host_hooks() -> Hooks {
    Hooks {
        raise: cfish_host_raise,
        trap: cfish_host_trap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_runtime;
    use crate::runtime::{LocalHeap, ObjectSystem};
    use std::sync::atomic::{AtomicUsize, Ordering};

    unsafe extern "C-unwind" fn count_up(context: *mut c_void) {
        let counter = unsafe { &*(context as *const AtomicUsize) };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C-unwind" fn throw_boom(context: *mut c_void) {
        let heap = unsafe { &*(context as *const LocalHeap) };
        heap.throw_message("boom");
    }

    unsafe extern "C-unwind" fn foreign_panic(_context: *mut c_void) {
        std::panic::panic_any(42u32);
    }

    #[test]
    fn test_trampoline_runs_routine() {
        let counter = AtomicUsize::new(0);
        unsafe {
            cfish_run_routine(count_up, &counter as *const AtomicUsize as *mut c_void);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_host_trap_returns_null_on_success() {
        let _ = test_runtime();
        let counter = AtomicUsize::new(0);
        let err = unsafe { cfish_host_trap(count_up, &counter as *const AtomicUsize as *mut c_void) };
        assert!(err.is_null());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_native_attempt_receives_owned_err() {
        let (rt, heap) = test_runtime();
        let err = unsafe { heap.attempt(throw_boom, &heap as *const LocalHeap as *mut c_void) }
            .expect("routine should have raised");

        unsafe {
            assert_eq!(heap.refcount(err), 1);
            assert_eq!(rt.extract_string(heap.err_get_mess(err)).unwrap(), "boom");
            assert_eq!(heap.dec_refcount(err), 0);
        }
    }

    #[test]
    fn test_host_trap_passes_foreign_panics() {
        let _ = test_runtime();
        let outcome = std::panic::catch_unwind(|| unsafe {
            cfish_host_trap(foreign_panic, std::ptr::null_mut())
        });
        let payload = outcome.expect_err("foreign panic must escape");
        assert_eq!(payload.downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn test_hooks_point_at_exports() {
        let hooks = host_hooks();
        assert_eq!(hooks.raise as usize, cfish_host_raise as usize);
        assert_eq!(hooks.trap as usize, cfish_host_trap as usize);
    }
}
