use crate::config::ConfigError;
use thiserror::Error;

/// Failures of the bridge itself.
///
/// Errors raised by native code never show up here; `trap` hands those back
/// as `TrappedErr`.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("bridge runtime has not been bootstrapped")]
    NotBootstrapped,

    #[error("bridge runtime is already bootstrapped")]
    AlreadyBootstrapped,

    #[error("{name} ABI mismatch: expected version {expected}, found {found}")]
    AbiMismatch {
        name: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("native handle is null")]
    NullHandle,

    #[error("text of {len} bytes exceeds max_string_bytes ({max})")]
    StringTooLong { len: usize, max: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
