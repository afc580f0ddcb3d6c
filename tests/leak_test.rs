mod common;

use cfish_bridge::runtime::ObjectSystem;
use cfish_bridge::{Obj, ObjPtr, Str, TrappedErr, trap, raise};

// One test per binary: it compares process-wide live object counts.
#[test]
fn test_ten_thousand_wrappers_return_to_baseline() {
    let (rt, heap) = common::runtime();
    let live_before = heap.live_objects();

    let handles: Vec<ObjPtr> = (0..10_000)
        .map(|i| heap.str_new_steal_utf8(format!("string #{i}").into_bytes().into_boxed_slice()))
        .collect();
    let baseline: Vec<u32> = handles
        .iter()
        .map(|&ptr| unsafe { heap.refcount(ptr) })
        .collect();

    {
        let wrappers: Vec<Obj> = handles
            .iter()
            .map(|&ptr| unsafe { Obj::inc_ref(rt, ptr) }.unwrap())
            .collect();
        for (wrapper, &ptr) in wrappers.iter().zip(&handles) {
            assert_eq!(wrapper.to_ptr(), ptr);
            assert_eq!(unsafe { heap.refcount(ptr) }, 2);
        }
    }
    assert_eq!(rt.collect(), 0);

    for (&ptr, &count) in handles.iter().zip(&baseline) {
        assert_eq!(unsafe { heap.refcount(ptr) }, count);
        unsafe { heap.dec_refcount(ptr) };
    }
    assert_eq!(heap.live_objects(), live_before);

    // Wrappers created by the bridge itself leave nothing behind either.
    {
        let strings: Vec<Str> = (0..1_000).map(|i| rt.new_string(&i.to_string()).unwrap()).collect();
        assert_eq!(heap.live_objects(), live_before + 1_000);
        drop(strings);

        let trapped: Vec<TrappedErr> = (0..1_000)
            .map(|i| trap::<()>(|| raise(rt.new_err(&format!("err {i}")))).unwrap_err())
            .collect();
        assert_eq!(heap.live_objects(), live_before + 2_000);
        drop(trapped);
    }
    assert_eq!(heap.live_objects(), live_before);
}
