//! Profiling support via Tracy.
//!
//! Re-exports the CPU profiling macros from [`redlilium_core::profiling`].
//! Compiling with the `profiling` feature turns them on:
//!
//! ```toml
//! [dependencies]
//! redlilium-framegraph = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! The frame graph itself opens a span around compilation, one around
//! execution and one per executed pass (named by the pass label), plots the
//! number of culled passes, and marks the end of each executed frame.
//!
//! Backends that record GPU timestamps can use the re-exported Tracy GPU
//! types to place pass spans on a GPU timeline.

// Re-export everything from core profiling module
pub use redlilium_core::profiling::*;

// Re-export GPU-specific tracy-client types when profiling is enabled
#[cfg(feature = "profiling")]
pub use tracy_client::{GpuContext, GpuContextType, GpuSpan};
