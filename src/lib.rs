//! A stack-oriented, postfix, concatenative runtime: the value model, the
//! hierarchical named store, the parser, and the trampolined call stack that
//! drives them. See `SPEC_FULL.md` and `DESIGN.md` for the design rationale.

pub mod builtin;
pub mod consts;
pub mod context;
pub mod directory;
pub mod error;
pub mod parser;
pub mod prims;
pub mod runtime;
pub mod types;
pub mod value;

pub use error::BreakFlag;
pub use runtime::Runtime;
pub use value::Value;

/// Install a `tracing` subscriber reading `RUST_LOG` (or default to `info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
