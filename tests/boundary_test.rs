mod common;

use cfish_bridge::runtime::{LocalHeap, ObjectSystem};
use cfish_bridge::{NativeObj, Obj, ObjPtr, TrappedErr, raise, run_guarded, trap};
use libc::c_void;
use std::panic;

#[test]
fn test_wrapper_releases_exactly_once() {
    let (rt, heap) = common::runtime();
    let ptr = heap.new_obj("Test::Pinned");
    unsafe { heap.inc_refcount(ptr) };

    let mut obj = unsafe { Obj::adopt(rt, ptr) }.unwrap();
    for _ in 0..5 {
        obj.release();
    }
    drop(obj);

    assert_eq!(unsafe { heap.refcount(ptr) }, 1);
    unsafe { heap.dec_refcount(ptr) };
}

#[test]
fn test_text_roundtrips_through_native_strings() {
    let (rt, _) = common::runtime();
    let mut rng = fastrand::Rng::with_seed(0x5eed);

    for _ in 0..500 {
        let len = rng.usize(0..48);
        let text: String = (0..len).map(|_| rng.char(..)).collect();
        let s = rt.new_string(&text).unwrap();
        assert_eq!(s.to_host_string().unwrap(), text);
    }

    assert_eq!(rt.new_string("").unwrap().to_host_string().unwrap(), "");
    assert_eq!(rt.extract_string(ObjPtr::null()).unwrap(), "");
}

#[test]
fn test_trap_returns_the_raised_object() {
    let (rt, _) = common::runtime();
    let err = TrappedErr::new(rt, "identity");
    let raised = err.to_ptr();

    let trapped = trap::<()>(|| raise(err)).unwrap_err();
    assert_eq!(trapped.to_ptr(), raised);
}

#[test]
fn test_trap_lets_foreign_panics_escape() {
    let outcome =
        panic::catch_unwind(|| trap::<()>(|| panic::panic_any(String::from("unrelated fault"))));

    let payload = outcome.expect_err("trap must not swallow foreign panics");
    assert_eq!(
        payload.downcast_ref::<String>().map(String::as_str),
        Some("unrelated fault")
    );
}

#[test]
fn test_trap_without_fault_returns_value() {
    let (rt, _) = common::runtime();
    let value = trap(|| run_guarded(|| rt.new_string("kept").unwrap().to_host_string()));
    assert_eq!(value.unwrap().unwrap(), "kept");
}

#[test]
fn test_extract_hello_through_handle() {
    let (rt, _) = common::runtime();
    let s = rt.new_string("hello").unwrap();
    let handle = s.to_ptr();
    assert_eq!(rt.extract_string(handle).unwrap(), "hello");
}

#[test]
fn test_trapped_boom_message() {
    let (rt, _) = common::runtime();
    let err = rt.new_err("boom");

    let trapped = trap::<()>(move || raise(err)).unwrap_err();
    assert_eq!(trapped.message(), "boom");
    assert_eq!(format!("{}", trapped), "boom");
}

#[test]
fn test_unrelated_fault_reaches_outer_handler() {
    #[derive(Debug, PartialEq)]
    struct Unrelated(u32);

    let (rt, _) = common::runtime();
    let reached_inner = std::sync::atomic::AtomicBool::new(false);

    let outer = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        trap::<()>(|| {
            let _keep = rt.new_string("unwound past").unwrap();
            reached_inner.store(true, std::sync::atomic::Ordering::SeqCst);
            panic::resume_unwind(Box::new(Unrelated(9)))
        })
    }));

    assert!(reached_inner.load(std::sync::atomic::Ordering::SeqCst));
    let payload = outer.unwrap_err();
    assert_eq!(payload.downcast_ref::<Unrelated>(), Some(&Unrelated(9)));
}

#[test]
fn test_untrapped_raise_terminates_the_thread() {
    let (rt, _) = common::runtime();

    let worker = std::thread::spawn(move || -> () { raise(rt.new_err("fatal to thread")) });
    let payload = worker.join().unwrap_err();
    let err = payload
        .downcast::<TrappedErr>()
        .expect("thread should end with the raised error");
    assert_eq!(err.message(), "fatal to thread");
}

unsafe extern "C-unwind" fn native_fault(context: *mut c_void) {
    let heap = unsafe { &*(context as *const LocalHeap) };
    heap.throw_message("native fault");
}

unsafe extern "C-unwind" fn native_ok(context: *mut c_void) {
    let heap = unsafe { &*(context as *const LocalHeap) };
    let obj = heap.new_obj("Test::Scratch");
    unsafe { heap.dec_refcount(obj) };
}

#[test]
fn test_native_code_traps_through_hooks() {
    let (rt, heap) = common::runtime();
    let context = &heap as *const LocalHeap as *mut c_void;

    assert!(unsafe { heap.attempt(native_ok, context) }.is_none());

    let err = unsafe { heap.attempt(native_fault, context) }.expect("routine raised");
    let err = unsafe { TrappedErr::adopt(rt, err) }.unwrap();
    assert_eq!(err.message(), "native fault");
}

#[test]
fn test_native_constructor_can_raise() {
    let (_, heap) = common::runtime();
    let err = trap(|| heap.str_new_steal_utf8(vec![0xc3, 0x28].into_boxed_slice())).unwrap_err();
    assert_eq!(err.message(), "Invalid UTF-8");
}

#[test]
fn test_shared_object_across_threads() {
    let (rt, heap) = common::runtime();
    let ptr = heap.new_obj("Test::Shared");

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let root = unsafe { Obj::inc_ref(rt, ptr) }.unwrap();
            std::thread::spawn(move || {
                let copies: Vec<Obj> = (0..1_000).map(|_| root.clone()).collect();
                assert!(copies.iter().all(|c| c == &root));
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(unsafe { heap.refcount(ptr) }, 1);
    unsafe { heap.dec_refcount(ptr) };
}
