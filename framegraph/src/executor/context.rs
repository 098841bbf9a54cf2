//! What a pass callback sees while it records.

use crate::backend::{CommandEncoder, GpuBuffer, GpuTexture, QueueType};
use crate::config::RenderContext;
use crate::error::GraphError;
use crate::graph::{BufferHandle, PassHandle, PhysicalResource, ResourceRegistry, TextureHandle};
use crate::types::{BufferDescriptor, Extent3d, TextureDescriptor};

/// Access to the encoder and to the physical resources bound for the frame.
///
/// Handed to the execute callback of each pass. Resources are only bound
/// between their create and release points, so looking up a resource the
/// pass did not declare may fail with [`GraphError::UnboundResource`].
pub struct PassContext<'a> {
    pub(crate) encoder: &'a mut dyn CommandEncoder,
    pub(crate) registry: &'a ResourceRegistry,
    pub(crate) render: &'a RenderContext,
    pub(crate) pass: PassHandle,
    pub(crate) label: &'a str,
    pub(crate) queue: QueueType,
}

impl<'a> PassContext<'a> {
    /// Encoder recording this pass. Commands land in the async stream for
    /// passes on the async compute queue.
    pub fn encoder(&mut self) -> &mut dyn CommandEncoder {
        &mut *self.encoder
    }

    /// Physical texture bound to `handle`.
    pub fn texture(&self, handle: TextureHandle) -> Result<GpuTexture, GraphError> {
        bound_texture(self.registry, handle)
    }

    /// Physical buffer bound to `handle`.
    pub fn buffer(&self, handle: BufferHandle) -> Result<GpuBuffer, GraphError> {
        self.registry.validate(handle.into())?;
        match self.registry.physical(handle.into()) {
            Some(PhysicalResource::Buffer(buffer)) => Ok(buffer),
            _ => Err(GraphError::UnboundResource(handle.into())),
        }
    }

    /// Descriptor `handle` was declared with, or `None` for a stale handle.
    pub fn texture_descriptor(&self, handle: TextureHandle) -> Option<&TextureDescriptor> {
        self.registry.texture_descriptor(handle)
    }

    /// Descriptor `handle` was declared with, or `None` for a stale handle.
    pub fn buffer_descriptor(&self, handle: BufferHandle) -> Option<&BufferDescriptor> {
        self.registry.buffer_descriptor(handle)
    }

    /// Per-frame values supplied to [`FrameGraph::execute`](crate::FrameGraph::execute).
    pub fn render_context(&self) -> &RenderContext {
        self.render
    }

    /// Index of the frame being executed.
    pub fn frame_index(&self) -> u64 {
        self.render.frame_index
    }

    /// Output extent of the frame.
    pub fn extent(&self) -> Extent3d {
        self.render.extent
    }

    /// Handle of the running pass.
    pub fn pass(&self) -> PassHandle {
        self.pass
    }

    /// Label of the running pass.
    pub fn label(&self) -> &str {
        self.label
    }

    /// Queue the running pass is recorded for.
    pub fn queue(&self) -> QueueType {
        self.queue
    }
}

pub(crate) fn bound_texture(
    registry: &ResourceRegistry,
    handle: TextureHandle,
) -> Result<GpuTexture, GraphError> {
    registry.validate(handle.into())?;
    match registry.physical(handle.into()) {
        Some(PhysicalResource::Texture(texture)) => Ok(texture),
        _ => Err(GraphError::UnboundResource(handle.into())),
    }
}
