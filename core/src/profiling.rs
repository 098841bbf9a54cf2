//! Optional Tracy instrumentation.
//!
//! Enabled through the `profiling` Cargo feature. Without it every macro in
//! this module expands to nothing (or to a plain evaluation of its argument),
//! so instrumented code carries no runtime cost.
//!
//! ```toml
//! [dependencies]
//! redlilium-framegraph = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use redlilium_core::profiling::{frame_mark, profile_scope, profile_scope_dynamic};
//!
//! fn compile_frame() {
//!     profile_scope!("compile_frame");
//!     for pass in passes {
//!         profile_scope_dynamic!(pass.label());
//!         // ...
//!     }
//!     frame_mark!();
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{
    self, Client, Span, frame_mark as tracy_frame_mark, plot as tracy_plot, span,
};

/// Mark the end of a frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op without `profiling`).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Open a span named by a string literal; it closes at the end of the scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:literal) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Open a span (no-op without `profiling`).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:literal) => {};
}

/// Open a span whose name is only known at runtime, such as a pass label.
///
/// The name is copied into Tracy's allocator, so prefer [`profile_scope!`]
/// for literal names.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|client| client.span_alloc(Some($name), "", file!(), line!(), 0));
    };
}

/// Open a runtime-named span (no-op without `profiling`).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        let _ = $name;
    };
}

/// Plot a numeric value, e.g. the number of culled passes per frame.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:literal, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op without `profiling`).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:literal, $value:expr) => {
        let _ = $value;
    };
}

pub use frame_mark;
pub use profile_plot;
pub use profile_scope;
pub use profile_scope_dynamic;
