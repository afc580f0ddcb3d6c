#![allow(dead_code)]

use cfish_bridge::logging::{LogOptions, init_logging};
use cfish_bridge::{BridgeConfig, LocalHeap, Runtime, bootstrap};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// The process-wide runtime, bootstrapped over a `LocalHeap` on first use.
/// Only the first call's `config` takes effect.
pub fn runtime_with(config: BridgeConfig) -> (&'static Runtime, LocalHeap) {
    static HEAP: OnceLock<LocalHeap> = OnceLock::new();
    let heap = HEAP
        .get_or_init(|| {
            init_logging(LogOptions::from_env());
            let heap = LocalHeap::new();
            bootstrap(heap.clone(), config).expect("bootstrap local heap");
            heap
        })
        .clone();
    (Runtime::current().expect("runtime"), heap)
}

pub fn runtime() -> (&'static Runtime, LocalHeap) {
    runtime_with(BridgeConfig::default())
}

/// Serializes tests that observe process-wide counters.
pub fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
