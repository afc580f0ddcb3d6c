//! The bound object system and one-time bootstrap.
//!
//! `bootstrap` runs once per process. It checks the hook ABI version, hands
//! the host hooks to the object system (`ObjectSystem::boot`) and publishes
//! the `Runtime` that every wrapper releases through. Native calls that can
//! raise must not happen before it returns.

use crate::config::{BridgeConfig, ReleasePolicy};
use crate::error::BridgeError;
use crate::release::DeferredReleaseQueue;
use crate::runtime::abi_version::{ABI_NAME, ABI_VERSION};
use crate::runtime::{ObjPtr, ObjectSystem, host_hooks};
use std::sync::{Mutex, OnceLock};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();
/// Held from the already-bootstrapped check until the runtime is published,
/// so only one object system is ever booted.
static BOOTSTRAP_LOCK: Mutex<()> = Mutex::new(());

pub struct Runtime {
    system: Box<dyn ObjectSystem>,
    config: BridgeConfig,
    deferred: DeferredReleaseQueue,
}

/// Bind `system` as the process-wide object system.
pub fn bootstrap<S: ObjectSystem>(
    system: S,
    config: BridgeConfig,
) -> Result<&'static Runtime, BridgeError> {
    config.validate()?;

    let found = system.abi_version();
    if found != ABI_VERSION {
        return Err(BridgeError::AbiMismatch {
            name: ABI_NAME,
            expected: ABI_VERSION,
            found,
        });
    }

    let _bootstrapping = BOOTSTRAP_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if RUNTIME.get().is_some() {
        return Err(BridgeError::AlreadyBootstrapped);
    }

    system.boot(host_hooks());

    let policy = config.release_policy;
    RUNTIME
        .set(Runtime {
            system: Box::new(system),
            config,
            deferred: DeferredReleaseQueue::new(),
        })
        .map_err(|_| BridgeError::AlreadyBootstrapped)?;

    tracing::debug!(abi = ABI_VERSION, %policy, "bridge runtime bootstrapped");
    Runtime::current()
}

impl Runtime {
    /// The runtime installed by `bootstrap`.
    pub fn current() -> Result<&'static Runtime, BridgeError> {
        RUNTIME.get().ok_or(BridgeError::NotBootstrapped)
    }

    pub fn system(&self) -> &dyn ObjectSystem {
        self.system.as_ref()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Give one count unit of `handle` back right now.
    pub(crate) fn release_handle(&self, handle: ObjPtr) {
        let remaining = unsafe { self.system.dec_refcount(handle) };
        tracing::trace!(?handle, remaining, "released native handle");
    }

    /// Give one count unit back according to the release policy.
    pub(crate) fn dispose(&self, handle: ObjPtr) {
        match self.config.release_policy {
            ReleasePolicy::Immediate => self.release_handle(handle),
            ReleasePolicy::Deferred => {
                self.deferred.defer(handle);
                if self.deferred.len() >= self.config.deferred_flush_threshold as u64 {
                    self.collect();
                }
            }
        }
    }

    /// Release every deferred handle. Returns how many were released.
    pub fn collect(&self) -> usize {
        let handles = self.deferred.take_all();
        let count = handles.len();
        for handle in handles {
            self.release_handle(handle);
        }
        if count > 0 {
            tracing::trace!("Processed {} deferred releases", count);
        }
        count
    }

    /// Handles waiting for `collect`.
    pub fn pending_releases(&self) -> u64 {
        self.deferred.len()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("deferred", &self.deferred)
            .finish_non_exhaustive()
    }
}

/// Runtime shared by the unit tests, bound to a `LocalHeap`.
#[cfg(test)]
pub(crate) fn test_runtime() -> (&'static Runtime, crate::runtime::LocalHeap) {
    use crate::runtime::LocalHeap;

    static HEAP: OnceLock<LocalHeap> = OnceLock::new();
    let heap = HEAP
        .get_or_init(|| {
            let heap = LocalHeap::new();
            bootstrap(heap.clone(), BridgeConfig::default()).expect("bootstrap test runtime");
            heap
        })
        .clone();
    (Runtime::current().expect("test runtime"), heap)
}
