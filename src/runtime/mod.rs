//! Runtime kernel for the native boundary
//!
//! This module holds the pieces that sit directly on the boundary:
//! - The native object system contract and handle type (abi.rs)
//! - The hook ABI version (abi_version.rs)
//! - Host functions exported to native code (stubs.rs)
//! - An in-process object system implementing the contract (heap.rs)
//!
//! Ownership-aware wrappers built on top live in `crate::obj`.

pub mod abi;
pub mod abi_version;
pub mod heap;
pub mod stubs;

pub use abi::{AttemptFn, Hooks, ObjPtr, ObjectSystem, RaiseFn, TrapFn};
pub use abi_version::ABI_VERSION;
pub use heap::{LocalHeap, ObjectKind};
pub use stubs::host_hooks;
