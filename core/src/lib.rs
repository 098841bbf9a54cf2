//! # RedLilium Core
//!
//! Utilities shared by the RedLilium frame graph crates: reset-in-place
//! containers for per-frame tables and optional Tracy instrumentation.

pub mod pool;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("RedLilium Core v{} initialized", VERSION);
}
