//! Collaborator contracts between the frame graph and a GPU backend.
//!
//! The frame graph never talks to a graphics API directly. It drives two
//! traits:
//!
//! - [`ResourcePool`] hands out textures and buffers matched by descriptor and
//!   takes them back when the compiled schedule says they are dead.
//! - [`CommandEncoder`] records render-pass scopes, queue switches, fences and
//!   debug markers, plus the handful of work commands pass callbacks issue.
//!
//! Reference implementations live alongside: [`TransientResourcePool`] keeps
//! descriptor-keyed free lists, and (with the `dummy` feature)
//! [`DummyEncoder`] records every command for inspection in tests.

#[cfg(feature = "dummy")]
mod dummy;
mod error;
mod pool;

#[cfg(feature = "dummy")]
pub use dummy::{DummyEncoder, EncodedCommand};
pub use error::BackendError;
pub use pool::{PoolStats, TransientResourcePool};

use std::fmt;

use crate::types::{BufferDescriptor, LoadOp, StoreOp, TextureDescriptor};

// ============================================================================
// GPU Objects
// ============================================================================

/// Backend texture identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuTexture(pub u64);

/// Backend buffer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuBuffer(pub u64);

/// Backend fence identifier, signaled when a queue passes a submission point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuFence(pub u64);

/// Hardware queue a pass is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueType {
    /// The main graphics queue.
    #[default]
    Graphics,
    /// The asynchronous compute queue.
    AsyncCompute,
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graphics => write!(f, "graphics"),
            Self::AsyncCompute => write!(f, "async-compute"),
        }
    }
}

// ============================================================================
// Render Pass Description
// ============================================================================

/// A color target of a native render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTarget {
    /// Attachment slot.
    pub slot: u8,
    /// Bound texture.
    pub texture: GpuTexture,
    /// Load action.
    pub load: LoadOp,
    /// Store action.
    pub store: StoreOp,
    /// Read in place as an input attachment by at least one subpass.
    pub input: bool,
}

/// The depth/stencil target of a native render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthTarget {
    /// Bound texture.
    pub texture: GpuTexture,
    /// Load action.
    pub load: LoadOp,
    /// Store action.
    pub store: StoreOp,
    /// Depth writes disabled.
    pub read_only: bool,
}

/// Everything a backend needs to open a native render pass.
///
/// A merged group opens one render pass with `subpass_count` subpasses and
/// advances with [`CommandEncoder::next_subpass`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDesc {
    /// Label of the first pass in the scope.
    pub label: String,
    /// Color targets ordered by slot.
    pub color_targets: Vec<ColorTarget>,
    /// Optional depth/stencil target.
    pub depth_target: Option<DepthTarget>,
    /// Number of subpasses in the scope (1 when not merged).
    pub subpass_count: u32,
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Allocator that recycles GPU resources across frames.
///
/// Resources are matched by descriptor equivalence (see
/// [`TextureDescriptor::pool_key`]). A resource handed out is leased until it
/// is released again; the pool never hands out a leased resource twice.
pub trait ResourcePool {
    /// Lease a texture matching `descriptor`.
    fn get_texture(&mut self, descriptor: &TextureDescriptor) -> Result<GpuTexture, BackendError>;

    /// Lease a buffer matching `descriptor`.
    fn get_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, BackendError>;

    /// Return a leased texture.
    fn release_texture(&mut self, texture: GpuTexture);

    /// Return a leased buffer.
    fn release_buffer(&mut self, buffer: GpuBuffer);
}

/// Command recording interface driven by the executor and by pass callbacks.
///
/// Commands are recorded into the *main* stream (graphics queue) unless a
/// secondary stream is open via [`begin_async_stream`](Self::begin_async_stream).
pub trait CommandEncoder {
    /// Open a native render pass.
    fn begin_render_pass(&mut self, desc: &RenderPassDesc) -> Result<(), BackendError>;

    /// Advance to the next subpass of the open render pass.
    fn next_subpass(&mut self) -> Result<(), BackendError>;

    /// Close the open render pass.
    fn end_render_pass(&mut self) -> Result<(), BackendError>;

    /// Submit everything recorded on the main stream so far.
    fn flush(&mut self) -> Result<(), BackendError>;

    /// Start recording into a secondary stream bound for the async compute queue.
    fn begin_async_stream(&mut self) -> Result<(), BackendError>;

    /// Submit the secondary stream to the async compute queue and resume the main stream.
    fn submit_async_stream(&mut self) -> Result<(), BackendError>;

    /// Create a fence signaled once `queue` reaches the current point.
    fn create_fence(&mut self, queue: QueueType) -> Result<GpuFence, BackendError>;

    /// Make `queue` wait for `fence` before continuing. Never blocks the CPU.
    fn wait_on_fence(&mut self, queue: QueueType, fence: GpuFence) -> Result<(), BackendError>;

    /// Open a labeled debug region.
    fn begin_debug_group(&mut self, label: &str);

    /// Close the innermost debug region.
    fn end_debug_group(&mut self);

    /// Issue a non-indexed draw.
    fn draw(&mut self, vertex_count: u32, instance_count: u32);

    /// Issue a compute dispatch.
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Issue a ray dispatch.
    fn trace_rays(&mut self, width: u32, height: u32, depth: u32);

    /// Copy one buffer into another.
    fn copy_buffer(&mut self, src: GpuBuffer, dst: GpuBuffer, size: u64);

    /// Copy one texture into another.
    fn copy_texture(&mut self, src: GpuTexture, dst: GpuTexture);
}
