//! Rust bindings to a reference-counted native object system.
//!
//! Two mechanisms make up the boundary:
//! - `obj`: wrappers that pin one native count unit each and give it back
//!   exactly once
//! - `err`: native errors raised as unwinds and trapped back into `Result`
//!
//! Call `bootstrap` once, before any native call that may raise.

pub mod config;
pub mod err;
pub mod error;
pub mod host;
pub mod logging;
pub mod obj;
pub mod release;
pub mod runtime;
pub mod string;

pub use config::{BridgeConfig, ReleasePolicy};
pub use err::{TrappedErr, raise, run_guarded, trap, trap_future};
#[cfg(feature = "tokio-tasks")]
pub use err::spawn_trapped;
pub use error::BridgeError;
pub use host::{Runtime, bootstrap};
pub use obj::{NativeObj, Obj, Scoped, with_scoped};
pub use runtime::{LocalHeap, ObjPtr, ObjectSystem};
pub use string::Str;
