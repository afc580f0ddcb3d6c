//! Version of the host hook contract
//!
//! Bumped whenever `Hooks` or an `ObjectSystem` method changes shape.

/// Current hook ABI version.
pub const ABI_VERSION: u32 = 1;

/// Name reported in ABI mismatch errors.
pub const ABI_NAME: &str = "cfish";
