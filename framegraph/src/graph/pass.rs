//! Pass records and the declaration builder.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{GraphError, PassError};
use crate::executor::PassContext;
use crate::types::{BufferDescriptor, TextureDescriptor};

use super::handle::{BufferHandle, PassHandle, ResourceHandle, TextureHandle};
use super::resource::ResourceRegistry;

/// Maximum number of color attachments per raster pass.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

// ============================================================================
// Pass Kinds and Attachment Access
// ============================================================================

/// What kind of GPU work a pass records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Copies and uploads.
    Transfer,
    /// Compute dispatches.
    Compute,
    /// Ray dispatches.
    RayTracing,
    /// Rasterization into attachments.
    Raster,
}

impl PassKind {
    /// Returns true if passes of this kind may run on the async compute queue.
    pub fn supports_async_compute(&self) -> bool {
        matches!(self, Self::Compute | Self::RayTracing)
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer => write!(f, "transfer"),
            Self::Compute => write!(f, "compute"),
            Self::RayTracing => write!(f, "ray tracing"),
            Self::Raster => write!(f, "raster"),
        }
    }
}

/// How a raster pass uses a color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorAccess {
    /// Every pixel is overwritten.
    WriteAll,
    /// Some pixels are written; previous contents must be kept.
    Write,
    /// Previous contents are irrelevant.
    Discard,
    /// Read in place as an input attachment.
    Read,
}

impl ColorAccess {
    /// Returns true if this access writes the attachment.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Read)
    }
}

/// How a raster pass uses its depth/stencil attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthAccess {
    /// Depth test only.
    ReadOnly,
    /// Depth test and write.
    ReadWrite,
}

/// A bound color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorAttachment {
    /// Bound texture.
    pub texture: TextureHandle,
    /// Access intent.
    pub access: ColorAccess,
}

/// A bound depth/stencil attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthAttachment {
    /// Bound texture.
    pub texture: TextureHandle,
    /// Access intent.
    pub access: DepthAccess,
}

// ============================================================================
// Type-Erased Execution
// ============================================================================

/// Type-erased execute callback of a pass.
pub(crate) trait PassExecutor {
    fn execute(&mut self, data: &dyn Any, ctx: &mut PassContext<'_>) -> Result<(), PassError>;
}

/// Binds a callback to the concrete pass data type it was declared with.
struct TypedExecutor<D, F> {
    func: F,
    _data: PhantomData<fn(&D)>,
}

impl<D, F> PassExecutor for TypedExecutor<D, F>
where
    D: 'static,
    F: FnMut(&D, &mut PassContext<'_>) -> Result<(), PassError>,
{
    fn execute(&mut self, data: &dyn Any, ctx: &mut PassContext<'_>) -> Result<(), PassError> {
        match data.downcast_ref::<D>() {
            Some(data) => (self.func)(data, ctx),
            None => Err(PassError::new(format!(
                "pass data is not a {}",
                std::any::type_name::<D>()
            ))),
        }
    }
}

// ============================================================================
// Pass Record
// ============================================================================

/// Everything declared for one pass.
pub(crate) struct PassRecord {
    pub(crate) handle: PassHandle,
    pub(crate) kind: PassKind,
    pub(crate) label: String,
    pub(crate) reads: Vec<ResourceHandle>,
    pub(crate) writes: Vec<ResourceHandle>,
    pub(crate) temporaries: Vec<ResourceHandle>,
    pub(crate) color_attachments: [Option<ColorAttachment>; MAX_COLOR_ATTACHMENTS],
    pub(crate) depth_attachment: Option<DepthAttachment>,
    pub(crate) allow_culling: bool,
    pub(crate) async_compute: bool,
    pub(crate) allow_merge: bool,
    pub(crate) data: Box<dyn Any>,
    pub(crate) executor: Option<Box<dyn PassExecutor>>,
}

impl PassRecord {
    pub(crate) fn new(handle: PassHandle, kind: PassKind, label: String) -> Self {
        Self {
            handle,
            kind,
            label,
            reads: Vec::new(),
            writes: Vec::new(),
            temporaries: Vec::new(),
            color_attachments: [None; MAX_COLOR_ATTACHMENTS],
            depth_attachment: None,
            allow_culling: true,
            async_compute: false,
            allow_merge: true,
            data: Box::new(()),
            executor: None,
        }
    }

    pub(crate) fn is_raster(&self) -> bool {
        self.kind == PassKind::Raster
    }

    /// Reads and writes, each resource at most once.
    pub(crate) fn accessed(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        self.reads.iter().copied().chain(
            self.writes
                .iter()
                .copied()
                .filter(|handle| !self.reads.contains(handle)),
        )
    }

    /// Every handle the pass refers to, for validation.
    pub(crate) fn referenced(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        let colors = self
            .color_attachments
            .iter()
            .flatten()
            .map(|a| ResourceHandle::from(a.texture));
        let depth = self
            .depth_attachment
            .iter()
            .map(|a| ResourceHandle::from(a.texture));
        self.reads
            .iter()
            .chain(&self.writes)
            .chain(&self.temporaries)
            .copied()
            .chain(colors)
            .chain(depth)
    }

    fn add_read(&mut self, handle: ResourceHandle) {
        if !self.reads.contains(&handle) {
            self.reads.push(handle);
        }
    }

    fn add_write(&mut self, handle: ResourceHandle) {
        if !self.writes.contains(&handle) {
            self.writes.push(handle);
        }
    }
}

impl fmt::Debug for PassRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassRecord")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .field("temporaries", &self.temporaries)
            .field("allow_culling", &self.allow_culling)
            .field("async_compute", &self.async_compute)
            .field("allow_merge", &self.allow_merge)
            .field("has_executor", &self.executor.is_some())
            .finish()
    }
}

// ============================================================================
// Pass Builder
// ============================================================================

/// Declares the resources, attachments and callback of one pass.
///
/// Returned by the `add_*_pass` methods of [`FrameGraph`](super::FrameGraph).
/// The pass data `D` lives in the builder while the pass is declared and is
/// moved into the graph when the builder is dropped.
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct BlurData {
///     source: Option<TextureHandle>,
/// }
///
/// let mut pass = graph.add_compute_pass::<BlurData>("blur");
/// let source = pass.read_texture(hdr);
/// pass.write_texture(blurred);
/// pass.data_mut().source = Some(source);
/// pass.set_execute_func(|data, ctx| {
///     let _src = ctx.texture(data.source.unwrap_or(hdr))?;
///     ctx.encoder().dispatch(120, 68, 1);
///     Ok(())
/// });
/// ```
pub struct PassBuilder<'g, D: Default + 'static> {
    record: &'g mut PassRecord,
    registry: &'g mut ResourceRegistry,
    data: D,
}

impl<'g, D: Default + 'static> PassBuilder<'g, D> {
    pub(crate) fn new(record: &'g mut PassRecord, registry: &'g mut ResourceRegistry) -> Self {
        Self {
            record,
            registry,
            data: D::default(),
        }
    }

    /// Handle of the pass being declared.
    pub fn handle(&self) -> PassHandle {
        self.record.handle
    }

    /// Kind of the pass being declared.
    pub fn kind(&self) -> PassKind {
        self.record.kind
    }

    /// Pass data.
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Pass data, mutably.
    pub fn data_mut(&mut self) -> &mut D {
        &mut self.data
    }

    /// Declare a texture read.
    pub fn read_texture(&mut self, texture: TextureHandle) -> TextureHandle {
        self.record.add_read(texture.into());
        texture
    }

    /// Declare a texture write.
    pub fn write_texture(&mut self, texture: TextureHandle) -> TextureHandle {
        self.record.add_write(texture.into());
        texture
    }

    /// Declare a buffer read.
    pub fn read_buffer(&mut self, buffer: BufferHandle) -> BufferHandle {
        self.record.add_read(buffer.into());
        buffer
    }

    /// Declare a buffer write.
    pub fn write_buffer(&mut self, buffer: BufferHandle) -> BufferHandle {
        self.record.add_write(buffer.into());
        buffer
    }

    /// Create a scratch texture that lives only for this pass.
    pub fn create_temporary_texture(&mut self, descriptor: TextureDescriptor) -> TextureHandle {
        let texture = self
            .registry
            .create_temporary_texture(self.record.handle, descriptor);
        self.record.temporaries.push(texture.into());
        texture
    }

    /// Create a scratch buffer that lives only for this pass.
    pub fn create_temporary_buffer(&mut self, descriptor: BufferDescriptor) -> BufferHandle {
        let buffer = self
            .registry
            .create_temporary_buffer(self.record.handle, descriptor);
        self.record.temporaries.push(buffer.into());
        buffer
    }

    /// Bind a color attachment to `slot`.
    ///
    /// Rebinding the same texture with the same access is a no-op; binding
    /// anything else to an occupied slot fails.
    pub fn set_color_attachment(
        &mut self,
        texture: TextureHandle,
        slot: usize,
        access: ColorAccess,
    ) -> Result<(), GraphError> {
        self.require_raster()?;
        if slot >= MAX_COLOR_ATTACHMENTS {
            return Err(GraphError::AttachmentSlotOutOfRange {
                pass: self.record.label.clone(),
                slot,
            });
        }

        let attachment = ColorAttachment { texture, access };
        match self.record.color_attachments[slot] {
            Some(existing) if existing == attachment => return Ok(()),
            Some(_) => {
                return Err(GraphError::AttachmentSlotConflict {
                    pass: self.record.label.clone(),
                    slot,
                });
            }
            None => {}
        }

        self.record.color_attachments[slot] = Some(attachment);
        if access.is_write() {
            self.record.add_write(texture.into());
        } else {
            self.record.add_read(texture.into());
        }
        Ok(())
    }

    /// Bind `texture` as an input attachment (a read-only color attachment).
    pub fn set_input_attachment(
        &mut self,
        texture: TextureHandle,
        slot: usize,
    ) -> Result<(), GraphError> {
        self.set_color_attachment(texture, slot, ColorAccess::Read)
    }

    /// Bind the depth/stencil attachment.
    pub fn set_depth_stencil_attachment(
        &mut self,
        texture: TextureHandle,
        access: DepthAccess,
    ) -> Result<(), GraphError> {
        self.require_raster()?;

        let attachment = DepthAttachment { texture, access };
        match self.record.depth_attachment {
            Some(existing) if existing == attachment => return Ok(()),
            Some(_) => {
                return Err(GraphError::DepthAttachmentConflict {
                    pass: self.record.label.clone(),
                });
            }
            None => {}
        }

        self.record.depth_attachment = Some(attachment);
        match access {
            DepthAccess::ReadOnly => self.record.add_read(texture.into()),
            DepthAccess::ReadWrite => self.record.add_write(texture.into()),
        }
        Ok(())
    }

    /// Allow or forbid culling this pass when its outputs are unused.
    pub fn enable_pass_culling(&mut self, enabled: bool) -> &mut Self {
        self.record.allow_culling = enabled;
        self
    }

    /// Run this pass on the async compute queue.
    ///
    /// Only compute and ray tracing passes can run asynchronously; the request
    /// is ignored with a warning for other kinds.
    pub fn enable_async_compute(&mut self, enabled: bool) -> &mut Self {
        if enabled && !self.record.kind.supports_async_compute() {
            log::warn!(
                "Pass '{}': async compute requested on a {} pass, keeping it on the graphics queue",
                self.record.label,
                self.record.kind
            );
            return self;
        }
        self.record.async_compute = enabled;
        self
    }

    /// Allow or forbid merging this pass with adjacent compatible raster passes.
    pub fn allow_pass_merge(&mut self, allowed: bool) -> &mut Self {
        self.record.allow_merge = allowed;
        self
    }

    /// Set the callback that records the pass's GPU work.
    ///
    /// Replaces any previously set callback.
    pub fn set_execute_func<F>(&mut self, func: F) -> &mut Self
    where
        F: FnMut(&D, &mut PassContext<'_>) -> Result<(), PassError> + 'static,
    {
        self.record.executor = Some(Box::new(TypedExecutor::<D, F> {
            func,
            _data: PhantomData,
        }));
        self
    }

    fn require_raster(&self) -> Result<(), GraphError> {
        if self.record.is_raster() {
            Ok(())
        } else {
            Err(GraphError::AttachmentOnNonRasterPass {
                pass: self.record.label.clone(),
                kind: self.record.kind,
            })
        }
    }
}

impl<D: Default + 'static> Drop for PassBuilder<'_, D> {
    fn drop(&mut self) {
        self.record.data = Box::new(std::mem::take(&mut self.data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TextureFormat, TextureUsage};

    fn color() -> TextureDescriptor {
        TextureDescriptor::new_2d(
            32,
            32,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT,
        )
    }

    fn raster() -> PassRecord {
        PassRecord::new(PassHandle::new(0), PassKind::Raster, "raster".into())
    }

    #[test]
    fn test_duplicate_reads_are_collapsed() {
        let mut registry = ResourceRegistry::new();
        let texture = registry.create_texture(color());
        let mut record = raster();
        {
            let mut pass = PassBuilder::<()>::new(&mut record, &mut registry);
            pass.read_texture(texture);
            pass.read_texture(texture);
        }
        assert_eq!(record.reads, vec![ResourceHandle::from(texture)]);
    }

    #[test]
    fn test_attachment_registers_access() {
        let mut registry = ResourceRegistry::new();
        let target = registry.create_texture(color());
        let input = registry.create_texture(color());
        let depth = registry.create_texture(color());
        let mut record = raster();
        {
            let mut pass = PassBuilder::<()>::new(&mut record, &mut registry);
            pass.set_color_attachment(target, 0, ColorAccess::WriteAll)
                .unwrap();
            pass.set_input_attachment(input, 1).unwrap();
            pass.set_depth_stencil_attachment(depth, DepthAccess::ReadOnly)
                .unwrap();
        }
        assert_eq!(record.writes, vec![ResourceHandle::from(target)]);
        assert_eq!(
            record.reads,
            vec![ResourceHandle::from(input), ResourceHandle::from(depth)]
        );
    }

    #[test]
    fn test_slot_conflict() {
        let mut registry = ResourceRegistry::new();
        let a = registry.create_texture(color());
        let b = registry.create_texture(color());
        let mut record = raster();
        let mut pass = PassBuilder::<()>::new(&mut record, &mut registry);

        pass.set_color_attachment(a, 2, ColorAccess::Write).unwrap();
        pass.set_color_attachment(a, 2, ColorAccess::Write).unwrap();
        assert!(matches!(
            pass.set_color_attachment(b, 2, ColorAccess::Write),
            Err(GraphError::AttachmentSlotConflict { slot: 2, .. })
        ));
        assert!(matches!(
            pass.set_color_attachment(a, 2, ColorAccess::Discard),
            Err(GraphError::AttachmentSlotConflict { slot: 2, .. })
        ));
        assert!(matches!(
            pass.set_color_attachment(a, MAX_COLOR_ATTACHMENTS, ColorAccess::Write),
            Err(GraphError::AttachmentSlotOutOfRange { .. })
        ));
    }

    #[test]
    fn test_depth_conflict() {
        let mut registry = ResourceRegistry::new();
        let a = registry.create_texture(color());
        let b = registry.create_texture(color());
        let mut record = raster();
        let mut pass = PassBuilder::<()>::new(&mut record, &mut registry);

        pass.set_depth_stencil_attachment(a, DepthAccess::ReadWrite)
            .unwrap();
        assert!(matches!(
            pass.set_depth_stencil_attachment(b, DepthAccess::ReadWrite),
            Err(GraphError::DepthAttachmentConflict { .. })
        ));
    }

    #[test]
    fn test_attachment_on_compute_pass_fails() {
        let mut registry = ResourceRegistry::new();
        let a = registry.create_texture(color());
        let mut record = PassRecord::new(PassHandle::new(0), PassKind::Compute, "cs".into());
        let mut pass = PassBuilder::<()>::new(&mut record, &mut registry);
        assert!(matches!(
            pass.set_color_attachment(a, 0, ColorAccess::Write),
            Err(GraphError::AttachmentOnNonRasterPass {
                kind: PassKind::Compute,
                ..
            })
        ));
    }

    #[test]
    fn test_async_ignored_on_raster() {
        let mut registry = ResourceRegistry::new();
        let mut record = raster();
        PassBuilder::<()>::new(&mut record, &mut registry).enable_async_compute(true);
        assert!(!record.async_compute);

        let mut record = PassRecord::new(PassHandle::new(1), PassKind::RayTracing, "rt".into());
        PassBuilder::<()>::new(&mut record, &mut registry).enable_async_compute(true);
        assert!(record.async_compute);
    }

    #[test]
    fn test_data_moves_into_record_on_drop() {
        let mut registry = ResourceRegistry::new();
        let mut record = raster();
        {
            let mut pass = PassBuilder::<u32>::new(&mut record, &mut registry);
            *pass.data_mut() = 17;
        }
        assert_eq!(record.data.downcast_ref::<u32>(), Some(&17));
    }

    #[test]
    fn test_temporaries_are_owned_by_pass() {
        let mut registry = ResourceRegistry::new();
        let mut record = raster();
        let scratch = PassBuilder::<()>::new(&mut record, &mut registry)
            .create_temporary_texture(color());
        assert_eq!(record.temporaries, vec![ResourceHandle::from(scratch)]);
        assert!(record.reads.is_empty() && record.writes.is_empty());
    }
}
