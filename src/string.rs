//! Text marshalling between Rust strings and native string objects.

use crate::err::{TrappedErr, trap};
use crate::error::BridgeError;
use crate::host::Runtime;
use crate::obj::{Obj, native_wrapper};
use crate::runtime::{ObjPtr, ObjectSystem};
use std::fmt;

native_wrapper!(
    /// A native string object.
    Str
);

impl Str {
    /// Copy the string's text out of the native object.
    pub fn to_host_string(&self) -> Result<String, TrappedErr> {
        self.obj.runtime().extract_string(self.obj.to_ptr())
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_host_string().unwrap_or_default())
    }
}

impl Runtime {
    /// Copy `text` into a new native string object.
    ///
    /// The object system takes ownership of the copied bytes. Text longer
    /// than `max_string_bytes` is rejected before anything is allocated.
    pub fn new_string(&'static self, text: &str) -> Result<Str, BridgeError> {
        let max = self.config().max_string_bytes;
        if text.len() > max {
            return Err(BridgeError::StringTooLong {
                len: text.len(),
                max,
            });
        }
        Ok(self.new_string_unchecked(text))
    }

    pub(crate) fn new_string_unchecked(&'static self, text: &str) -> Str {
        let bytes: Box<[u8]> = text.as_bytes().into();
        let handle = self.system().str_new_steal_utf8(bytes);
        Str::from_obj(unsafe { Obj::adopt_unchecked(self, handle) })
    }

    /// Copy the text of a native object into a Rust `String`.
    ///
    /// A null handle reads as empty text. Objects that are not strings are
    /// coerced by the object system first; if the coercion raises, the
    /// error is returned rather than empty text.
    pub fn extract_string(&self, handle: ObjPtr) -> Result<String, TrappedErr> {
        if handle.is_null() {
            return Ok(String::new());
        }
        let system = self.system();
        if unsafe { system.is_string(handle) } {
            return Ok(unsafe { copy_text(system, handle) });
        }

        let coerced = trap(|| unsafe { system.to_string(handle) })?;
        let text = unsafe { copy_text(system, coerced) };
        self.release_handle(coerced);
        Ok(text)
    }
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a
/// character.
pub(crate) fn clamp_text(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// # Safety
/// `s` must be a live String-kind handle.
unsafe fn copy_text(system: &dyn ObjectSystem, s: ObjPtr) -> String {
    let (data, len) = unsafe { system.str_bytes(s) };
    if data.is_null() || len == 0 {
        return String::new();
    }
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    String::from_utf8_lossy(bytes).into_owned()
}
