//! # RedLilium Frame Graph
//!
//! Frame-scoped GPU frame graph: declare the passes of a frame, let the
//! compiler work out what actually has to run and how, then execute the plan
//! against a backend.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`FrameGraph`] - Declaration surface for passes and resources
//! - [`compiler`] - Culling, load/store inference, cross-queue fences, pass
//!   merging and transient resource lifetimes
//! - [`executor`] - Per-pass state machine with guaranteed frame cleanup
//! - [`backend`] - [`ResourcePool`] and [`CommandEncoder`] collaborator traits,
//!   plus a pooling allocator and (with the `dummy` feature) a recording
//!   encoder for tests
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_framegraph::{
//!     ColorAccess, DummyEncoder, FrameGraph, RenderContext, TransientResourcePool,
//! };
//!
//! let mut pool = TransientResourcePool::new();
//! let mut encoder = DummyEncoder::new();
//! let mut graph = FrameGraph::new();
//!
//! let backbuffer = graph.import_texture(swapchain_image, backbuffer_desc);
//! {
//!     let mut pass = graph.add_raster_pass::<()>("present");
//!     pass.set_color_attachment(backbuffer, 0, ColorAccess::WriteAll)?;
//!     pass.set_execute_func(|_, ctx| {
//!         ctx.encoder().draw(3, 1);
//!         Ok(())
//!     });
//! }
//!
//! let report = graph.execute(&RenderContext::default(), &mut pool, &mut encoder)?;
//! ```

pub mod backend;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod profiling;
pub mod types;

// Re-export main types for convenience
#[cfg(feature = "dummy")]
pub use backend::{DummyEncoder, EncodedCommand};
pub use backend::{
    BackendError, CommandEncoder, GpuBuffer, GpuFence, GpuTexture, QueueType, RenderPassDesc,
    ResourcePool, TransientResourcePool,
};
pub use compiler::{CompiledGraph, MergeGroup, PassCompileInfo, ReleasePoint, ResourceCompileInfo};
pub use config::{FrameGraphConfig, RenderContext};
pub use error::{GraphError, PassError};
pub use executor::{FrameReport, PassContext, PassState};
pub use graph::{
    BufferHandle, ColorAccess, DepthAccess, FrameGraph, MAX_COLOR_ATTACHMENTS, PassBuilder,
    PassHandle, PassKind, ResourceHandle, TextureHandle,
};
pub use types::{
    AttachmentOps, BufferDescriptor, BufferUsage, ClearValue, Extent3d, LoadOp, StoreOp,
    TextureDescriptor, TextureFormat, TextureUsage,
};

/// Frame graph library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version.
pub fn init() {
    redlilium_core::init();
    log::info!("RedLilium Frame Graph v{} initialized", VERSION);
}
