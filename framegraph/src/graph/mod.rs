//! Frame graph declaration.
//!
//! A [`FrameGraph`] collects everything one frame of GPU work needs: the
//! resources it touches and the passes that read and write them. It is
//! rebuilt every frame; after [`FrameGraph::execute`] (or
//! [`FrameGraph::reset`]) all handles issued for the frame become stale.
//!
//! # Example
//!
//! ```ignore
//! use redlilium_framegraph::{ColorAccess, FrameGraph, TextureDescriptor};
//!
//! let mut graph = FrameGraph::new();
//! let backbuffer = graph.import_texture(swapchain_image, backbuffer_desc);
//! let hdr = graph.create_texture(hdr_desc);
//!
//! {
//!     let mut pass = graph.add_raster_pass::<()>("opaque");
//!     pass.set_color_attachment(hdr, 0, ColorAccess::WriteAll)?;
//!     pass.set_execute_func(|_, ctx| {
//!         ctx.encoder().draw(3, 1);
//!         Ok(())
//!     });
//! }
//! {
//!     let mut pass = graph.add_raster_pass::<()>("tonemap");
//!     pass.read_texture(hdr);
//!     pass.set_color_attachment(backbuffer, 0, ColorAccess::WriteAll)?;
//!     pass.set_execute_func(|_, ctx| {
//!         ctx.encoder().draw(3, 1);
//!         Ok(())
//!     });
//! }
//!
//! let report = graph.execute(&render_context, &mut pool, &mut encoder)?;
//! ```

mod handle;
mod pass;
mod resource;

pub use handle::{BufferHandle, PassHandle, ResourceHandle, ResourceKind, TextureHandle};
pub use pass::{
    ColorAccess, ColorAttachment, DepthAccess, DepthAttachment, MAX_COLOR_ATTACHMENTS,
    PassBuilder, PassKind,
};
pub(crate) use pass::PassRecord;
pub use resource::{PhysicalResource, ResourceDescriptor, ResourceOrigin, ResourceRegistry};

use redlilium_core::pool::Pooled;

use crate::backend::{CommandEncoder, GpuBuffer, GpuTexture, ResourcePool};
use crate::compiler::{self, CompiledGraph};
use crate::config::{FrameGraphConfig, RenderContext};
use crate::error::GraphError;
use crate::executor::{self, FrameReport};
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Declarative description of one frame of GPU work.
#[derive(Debug, Default)]
pub struct FrameGraph {
    pub(crate) config: FrameGraphConfig,
    pub(crate) passes: Vec<PassRecord>,
    pub(crate) registry: ResourceRegistry,
    pub(crate) compiled: Pooled<CompiledGraph>,
}

impl FrameGraph {
    /// Create an empty frame graph with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty frame graph with the given configuration.
    pub fn with_config(config: FrameGraphConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }

    /// Replace the configuration; takes effect at the next compile.
    pub fn set_config(&mut self, config: FrameGraphConfig) {
        self.config = config;
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Declare a transient texture owned by the graph for this frame.
    pub fn create_texture(&mut self, descriptor: TextureDescriptor) -> TextureHandle {
        self.registry.create_texture(descriptor)
    }

    /// Declare a transient buffer owned by the graph for this frame.
    pub fn create_buffer(&mut self, descriptor: BufferDescriptor) -> BufferHandle {
        self.registry.create_buffer(descriptor)
    }

    /// Bring an externally owned texture into the frame.
    pub fn import_texture(&mut self, texture: GpuTexture, descriptor: TextureDescriptor) -> TextureHandle {
        self.registry.import_texture(texture, descriptor)
    }

    /// Bring an externally owned buffer into the frame.
    pub fn import_buffer(&mut self, buffer: GpuBuffer, descriptor: BufferDescriptor) -> BufferHandle {
        self.registry.import_buffer(buffer, descriptor)
    }

    /// Resources declared so far.
    pub fn resources(&self) -> &ResourceRegistry {
        &self.registry
    }

    // ========================================================================
    // Passes
    // ========================================================================

    /// Add a raster pass.
    pub fn add_raster_pass<D: Default + 'static>(&mut self, label: impl Into<String>) -> PassBuilder<'_, D> {
        self.add_pass(PassKind::Raster, label.into())
    }

    /// Add a compute pass.
    pub fn add_compute_pass<D: Default + 'static>(&mut self, label: impl Into<String>) -> PassBuilder<'_, D> {
        self.add_pass(PassKind::Compute, label.into())
    }

    /// Add a transfer pass.
    pub fn add_transfer_pass<D: Default + 'static>(&mut self, label: impl Into<String>) -> PassBuilder<'_, D> {
        self.add_pass(PassKind::Transfer, label.into())
    }

    /// Add a ray tracing pass.
    pub fn add_ray_tracing_pass<D: Default + 'static>(
        &mut self,
        label: impl Into<String>,
    ) -> PassBuilder<'_, D> {
        self.add_pass(PassKind::RayTracing, label.into())
    }

    /// Number of declared passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Label of a declared pass.
    pub fn pass_label(&self, pass: PassHandle) -> Option<&str> {
        self.passes.get(pass.slot()).map(|record| record.label.as_str())
    }

    /// Kind of a declared pass.
    pub fn pass_kind(&self, pass: PassHandle) -> Option<PassKind> {
        self.passes.get(pass.slot()).map(|record| record.kind)
    }

    fn add_pass<D: Default + 'static>(&mut self, kind: PassKind, label: String) -> PassBuilder<'_, D> {
        self.compiled.release();
        let handle = PassHandle::new(self.passes.len() as u32);
        log::trace!("Declaring {} pass '{}' as {}", kind, label, handle);
        self.passes.push(PassRecord::new(handle, kind, label));
        let record = &mut self.passes[handle.slot()];
        PassBuilder::new(record, &mut self.registry)
    }

    // ========================================================================
    // Compilation and Execution
    // ========================================================================

    /// Compile the declared frame without executing it.
    ///
    /// Useful for inspecting culling, load/store actions, merge groups,
    /// fences and resource lifetimes. The frame stays declared; call
    /// [`execute`](Self::execute) or [`reset`](Self::reset) afterwards.
    pub fn compile(&mut self) -> Result<&CompiledGraph, GraphError> {
        let result = compiler::compile_into(
            &self.passes,
            &self.registry,
            &self.config,
            self.compiled.activate(),
        );
        if let Err(error) = result {
            self.compiled.release();
            return Err(error);
        }

        let compiled = self.compiled.inner();
        if self.config.log_execution_plan {
            compiler::log_execution_plan(compiled, &self.passes, &self.registry);
        }
        Ok(compiled)
    }

    /// Compile and execute the frame, then reset the graph.
    ///
    /// Cleanup (returning every leased resource to `pool` and dropping the
    /// frame's passes and resources) runs whether execution succeeds, fails
    /// or panics.
    pub fn execute(
        &mut self,
        ctx: &RenderContext,
        pool: &mut dyn ResourcePool,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<FrameReport, GraphError> {
        executor::execute_frame(self, ctx, pool, encoder)
    }

    /// Discard the declared frame. All handles issued so far become stale.
    pub fn reset(&mut self) {
        self.passes.clear();
        self.registry.clear();
        self.compiled.release();
    }
}
