//! Deferred release queue for native handles.
//!
//! Under `ReleasePolicy::Deferred`, dropping a wrapper leaves the object
//! system alone: the handle lands here together with its count unit. The
//! runtime gives those units back on `Runtime::collect()`, or inline once the
//! backlog reaches the configured flush threshold.
//!
//! `pending` mirrors the queue length and only changes while the queue lock
//! is held, so it never runs ahead of or behind the queue. Reading it does
//! not take the lock.

use crate::runtime::ObjPtr;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handles whose count unit is still owed to the object system.
pub struct DeferredReleaseQueue {
    handles: Mutex<VecDeque<ObjPtr>>,
    pending: AtomicU64,
}

impl Default for DeferredReleaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredReleaseQueue {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(VecDeque::with_capacity(64)),
            pending: AtomicU64::new(0),
        }
    }

    /// Queue a handle; the queue now owns its count unit.
    pub fn defer(&self, handle: ObjPtr) {
        let pending = {
            let mut handles = self.handles.lock().expect("deferred release queue poisoned");
            handles.push_back(handle);
            self.pending.fetch_add(1, Ordering::Release) + 1
        };
        tracing::trace!(?handle, pending, "deferred native release");
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.len() > 0
    }

    /// Handles waiting to be released.
    #[inline]
    pub fn len(&self) -> u64 {
        self.pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Remove and return every queued handle. The caller inherits their
    /// count units.
    pub fn take_all(&self) -> VecDeque<ObjPtr> {
        if !self.has_pending() {
            return VecDeque::new();
        }

        let mut handles = self.handles.lock().expect("deferred release queue poisoned");
        let taken = std::mem::take(&mut *handles);
        self.pending.fetch_sub(taken.len() as u64, Ordering::Release);
        taken
    }
}

impl std::fmt::Debug for DeferredReleaseQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredReleaseQueue")
            .field("pending", &self.len())
            .finish()
    }
}
