//! Runtime-wide bounds and well-known names.

/// Hard cap on the call-stack depth (root context starts here and counts down).
pub const CALL_DEPTH: i64 = 2048;

/// Hard cap on structural-copy and cycle-detection recursion.
pub const CP_DEPTH: u32 = 64;

/// Maximum bytes a single file read may pull into the parser or a handle.
pub const MAX_READ: usize = 256_000;

/// Directory under which the reference primitive library is installed.
pub const INTERNALS_DIR: &str = "I*";

/// Symbol evaluated by `Runtime::ded` to dispatch to the user's handler.
pub const EXCEPT_SYMBOL: &str = "EXCEPT";

/// Base directory used by the bootstrap sequence to locate `boot.rpl`.
pub const BASE_DIR: &str = "./";
