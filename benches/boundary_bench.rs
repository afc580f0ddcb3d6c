//! Boundary crossing benchmarks
//!
//! Measures the cost of the two boundary mechanisms over a `LocalHeap`:
//! wrapper adopt/release and raise/trap round trips.
//!
//! Run with: cargo bench --bench boundary_bench

use cfish_bridge::runtime::ObjectSystem;
use cfish_bridge::{BridgeConfig, LocalHeap, Obj, bootstrap, raise, trap};
use std::hint::black_box;
use std::time::Instant;

// Simple timing macro for benchmarks
macro_rules! bench {
    ($name:expr, $iterations:expr, $code:block) => {{
        let start = Instant::now();
        for _ in 0..$iterations {
            black_box($code);
        }
        let elapsed = start.elapsed();
        let per_iter = elapsed / $iterations;
        println!(
            "{}: {} iterations in {:?} ({:?}/iter, {:.0} ops/sec)",
            $name,
            $iterations,
            elapsed,
            per_iter,
            $iterations as f64 / elapsed.as_secs_f64()
        );
        elapsed
    }};
}

fn main() {
    let heap = LocalHeap::new();
    let rt = match bootstrap(heap.clone(), BridgeConfig::default()) {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: bootstrap failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("==============================================");
    println!("  Boundary Benchmarks");
    println!("==============================================\n");

    let shared = heap.new_obj("Bench::Shared");

    println!("=== Reference Wrapper ===");
    bench!("Obj::inc_ref + drop", 1_000_000u32, {
        let obj = unsafe { Obj::inc_ref(rt, shared) };
        drop(obj)
    });
    bench!("Runtime::new_string + drop", 200_000u32, {
        rt.new_string("benchmark payload").ok()
    });

    println!("\n=== Error Bridge ===");
    bench!("trap (no fault)", 1_000_000u32, { trap(|| 1u64) });
    bench!("raise + trap", 100_000u32, {
        trap::<()>(|| raise(rt.new_err("bench")))
    });

    unsafe { heap.dec_refcount(shared) };
    println!("\nlive objects after run: {}", heap.live_objects());
}
