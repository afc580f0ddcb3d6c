//! Error propagation across the boundary.
//!
//! Native code signals a fault by calling the injected raise hook. That
//! wraps the native error object as a `TrappedErr` and unwinds with it as the
//! payload. The unwind runs through Rust frames like any panic until a
//! `trap` intercepts it and turns it back into `Err(TrappedErr)`. If nothing
//! traps it, the current thread (or tokio task) ends.
//!
//! `trap` only intercepts `TrappedErr` payloads. Every other panic resumes
//! unwinding untouched.

use crate::host::Runtime;
use crate::obj::{Obj, native_wrapper};
use crate::string::clamp_text;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

native_wrapper!(
    /// A native error object, as caught by `trap`.
    TrappedErr
);

impl TrappedErr {
    /// Build a native error carrying `mess`.
    pub fn new(rt: &'static Runtime, mess: &str) -> Self {
        rt.new_err(mess)
    }

    /// The error's message, coerced to text by the object system if needed.
    pub fn try_message(&self) -> Result<String, TrappedErr> {
        let handle = self.obj.to_ptr();
        if handle.is_null() {
            return Ok(String::new());
        }
        let rt = self.obj.runtime();
        let mess = unsafe { rt.system().err_get_mess(handle) };
        rt.extract_string(mess)
    }

    /// Like `try_message`, but an unextractable message reads as empty.
    pub fn message(&self) -> String {
        match self.try_message() {
            Ok(mess) => mess,
            Err(nested) => {
                tracing::warn!(
                    handle = ?self.obj.to_ptr(),
                    nested = ?nested.obj.to_ptr(),
                    "failed to extract native error message"
                );
                String::new()
            }
        }
    }
}

impl fmt::Display for TrappedErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for TrappedErr {}

impl Runtime {
    /// Build a native error object carrying `mess`.
    ///
    /// Messages longer than `max_string_bytes` are cut at a character
    /// boundary.
    pub fn new_err(&'static self, mess: &str) -> TrappedErr {
        let mess = clamp_text(mess, self.config().max_string_bytes);
        let mess = self.new_string_unchecked(mess).into_raw();
        let handle = unsafe { self.system().err_new(mess) };
        TrappedErr::from_obj(unsafe { Obj::adopt_unchecked(self, handle) })
    }
}

/// Unwind with `err` as the payload. Never returns.
///
/// The panic hook is not invoked: a raised error is expected to be trapped.
pub fn raise(err: TrappedErr) -> ! {
    tracing::debug!(handle = ?err.obj.to_ptr(), "raising native error");
    panic::resume_unwind(Box::new(err))
}

/// Invoke `routine`. Native code calls routines that may raise through
/// this, so trapped and untrapped calls look the same at the call site.
#[inline]
pub fn run_guarded<R>(routine: impl FnOnce() -> R) -> R {
    routine()
}

/// Run `routine`, converting a raised native error into `Err`.
///
/// The error comes back as the very object that was raised. Any other
/// panic keeps unwinding past this call with its payload unchanged.
pub fn trap<R>(routine: impl FnOnce() -> R) -> Result<R, TrappedErr> {
    match panic::catch_unwind(AssertUnwindSafe(routine)) {
        Ok(value) => Ok(value),
        Err(payload) => Err(intercept(payload)),
    }
}

/// Async counterpart of `trap`, covering every poll of `fut`.
pub async fn trap_future<F: Future>(fut: F) -> Result<F::Output, TrappedErr> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(value) => Ok(value),
        Err(payload) => Err(intercept(payload)),
    }
}

/// Spawn `fut` on the current tokio runtime with native errors trapped.
///
/// Other panics still abort the task and surface as a panicking `JoinError`.
#[cfg(feature = "tokio-tasks")]
pub fn spawn_trapped<F>(fut: F) -> tokio::task::JoinHandle<Result<F::Output, TrappedErr>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(trap_future(fut))
}

fn intercept(payload: Box<dyn std::any::Any + Send>) -> TrappedErr {
    match payload.downcast::<TrappedErr>() {
        Ok(err) => {
            tracing::debug!(handle = ?err.obj.to_ptr(), "trapped native error");
            *err
        }
        Err(other) => panic::resume_unwind(other),
    }
}
