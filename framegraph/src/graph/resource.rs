//! Per-frame resource registry.
//!
//! Every texture or buffer the frame touches gets one record here, whether the
//! graph creates it (transient, backed by the [`ResourcePool`]) or it is
//! imported from outside (externally owned, never allocated or released by the
//! graph). During execution the registry also holds the physical GPU object
//! each record is currently bound to.
//!
//! [`ResourcePool`]: crate::backend::ResourcePool

use crate::backend::{GpuBuffer, GpuTexture};
use crate::error::GraphError;
use crate::types::{BufferDescriptor, ClearValue, TextureDescriptor};

use super::handle::{BufferHandle, PassHandle, ResourceHandle, ResourceKind, TextureHandle};

/// Descriptor of a registered resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDescriptor {
    Texture(TextureDescriptor),
    Buffer(BufferDescriptor),
}

impl ResourceDescriptor {
    /// Resource kind.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Texture(_) => ResourceKind::Texture,
            Self::Buffer(_) => ResourceKind::Buffer,
        }
    }

    /// Debug label, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Texture(desc) => desc.label.as_deref(),
            Self::Buffer(desc) => desc.label.as_deref(),
        }
    }

    /// Clear requested by the descriptor (always `None` for buffers).
    pub fn clear_value(&self) -> ClearValue {
        match self {
            Self::Texture(desc) => desc.clear_value,
            Self::Buffer(_) => ClearValue::None,
        }
    }
}

/// Where a resource comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOrigin {
    /// Allocated by the graph for this frame.
    Transient,
    /// Scratch resource owned by a single pass.
    Temporary(PassHandle),
    /// Owned outside the graph; writing it is a side effect.
    Imported,
}

/// A physical GPU object bound to a registry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalResource {
    Texture(GpuTexture),
    Buffer(GpuBuffer),
}

#[derive(Debug)]
struct ResourceRecord {
    descriptor: ResourceDescriptor,
    origin: ResourceOrigin,
    physical: Option<PhysicalResource>,
}

/// All resources declared in the current frame.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    records: Vec<ResourceRecord>,
    generation: u32,
}

impl ResourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no resource is registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Generation stamped into handles issued by this registry.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Register a transient texture.
    pub fn create_texture(&mut self, descriptor: TextureDescriptor) -> TextureHandle {
        self.push_texture(descriptor, ResourceOrigin::Transient, None)
    }

    /// Register a transient buffer.
    pub fn create_buffer(&mut self, descriptor: BufferDescriptor) -> BufferHandle {
        self.push_buffer(descriptor, ResourceOrigin::Transient, None)
    }

    pub(crate) fn create_temporary_texture(
        &mut self,
        owner: PassHandle,
        descriptor: TextureDescriptor,
    ) -> TextureHandle {
        self.push_texture(descriptor, ResourceOrigin::Temporary(owner), None)
    }

    pub(crate) fn create_temporary_buffer(
        &mut self,
        owner: PassHandle,
        descriptor: BufferDescriptor,
    ) -> BufferHandle {
        self.push_buffer(descriptor, ResourceOrigin::Temporary(owner), None)
    }

    /// Register an externally owned texture.
    pub fn import_texture(
        &mut self,
        texture: GpuTexture,
        descriptor: TextureDescriptor,
    ) -> TextureHandle {
        self.push_texture(
            descriptor,
            ResourceOrigin::Imported,
            Some(PhysicalResource::Texture(texture)),
        )
    }

    /// Register an externally owned buffer.
    pub fn import_buffer(&mut self, buffer: GpuBuffer, descriptor: BufferDescriptor) -> BufferHandle {
        self.push_buffer(
            descriptor,
            ResourceOrigin::Imported,
            Some(PhysicalResource::Buffer(buffer)),
        )
    }

    /// Check that `handle` was issued by this registry in the current frame.
    pub fn validate(&self, handle: ResourceHandle) -> Result<(), GraphError> {
        if handle.generation() != self.generation {
            return Err(GraphError::StaleHandle {
                handle,
                generation: handle.generation(),
                current: self.generation,
            });
        }
        match self.records.get(handle.slot()) {
            Some(record) if record.descriptor.kind() == handle.kind() => Ok(()),
            _ => Err(GraphError::InvalidHandle(handle)),
        }
    }

    /// Descriptor of a registered resource.
    pub fn descriptor(&self, handle: ResourceHandle) -> Option<&ResourceDescriptor> {
        self.record(handle).map(|r| &r.descriptor)
    }

    /// Texture descriptor of a registered texture.
    pub fn texture_descriptor(&self, handle: TextureHandle) -> Option<&TextureDescriptor> {
        match self.descriptor(handle.into()) {
            Some(ResourceDescriptor::Texture(desc)) => Some(desc),
            _ => None,
        }
    }

    /// Buffer descriptor of a registered buffer.
    pub fn buffer_descriptor(&self, handle: BufferHandle) -> Option<&BufferDescriptor> {
        match self.descriptor(handle.into()) {
            Some(ResourceDescriptor::Buffer(desc)) => Some(desc),
            _ => None,
        }
    }

    /// Origin of a registered resource.
    pub fn origin(&self, handle: ResourceHandle) -> Option<ResourceOrigin> {
        self.record(handle).map(|r| r.origin)
    }

    /// Returns true if the resource is imported.
    pub fn is_imported(&self, handle: ResourceHandle) -> bool {
        self.origin(handle) == Some(ResourceOrigin::Imported)
    }

    /// Physical object currently bound to the resource.
    pub fn physical(&self, handle: ResourceHandle) -> Option<PhysicalResource> {
        self.record(handle).and_then(|r| r.physical)
    }

    /// Handles of every registered resource, in registration order.
    pub fn handles(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
        let generation = self.generation;
        self.records
            .iter()
            .enumerate()
            .map(move |(index, record)| handle_for(record.descriptor.kind(), index, generation))
    }

    /// Name used in logs: the label when present, the handle otherwise.
    pub fn display_name(&self, handle: ResourceHandle) -> String {
        match self.descriptor(handle).and_then(ResourceDescriptor::label) {
            Some(label) => label.to_owned(),
            None => handle.to_string(),
        }
    }

    pub(crate) fn bind(&mut self, handle: ResourceHandle, physical: PhysicalResource) {
        if let Some(record) = self.records.get_mut(handle.slot()) {
            record.physical = Some(physical);
        }
    }

    pub(crate) fn unbind(&mut self, handle: ResourceHandle) -> Option<PhysicalResource> {
        self.records
            .get_mut(handle.slot())
            .and_then(|record| record.physical.take())
    }

    /// Unbind every graph-owned resource that is still bound.
    pub(crate) fn drain_leased(&mut self) -> Vec<PhysicalResource> {
        self.records
            .iter_mut()
            .filter(|record| record.origin != ResourceOrigin::Imported)
            .filter_map(|record| record.physical.take())
            .collect()
    }

    /// Drop every record and start a new generation.
    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    fn record(&self, handle: ResourceHandle) -> Option<&ResourceRecord> {
        if handle.generation() != self.generation {
            return None;
        }
        self.records
            .get(handle.slot())
            .filter(|record| record.descriptor.kind() == handle.kind())
    }

    fn push_texture(
        &mut self,
        descriptor: TextureDescriptor,
        origin: ResourceOrigin,
        physical: Option<PhysicalResource>,
    ) -> TextureHandle {
        let index = self.push(ResourceDescriptor::Texture(descriptor), origin, physical);
        TextureHandle::new(index, self.generation)
    }

    fn push_buffer(
        &mut self,
        descriptor: BufferDescriptor,
        origin: ResourceOrigin,
        physical: Option<PhysicalResource>,
    ) -> BufferHandle {
        let index = self.push(ResourceDescriptor::Buffer(descriptor), origin, physical);
        BufferHandle::new(index, self.generation)
    }

    fn push(
        &mut self,
        descriptor: ResourceDescriptor,
        origin: ResourceOrigin,
        physical: Option<PhysicalResource>,
    ) -> u32 {
        let index = self.records.len() as u32;
        self.records.push(ResourceRecord {
            descriptor,
            origin,
            physical,
        });
        index
    }
}

fn handle_for(kind: ResourceKind, index: usize, generation: u32) -> ResourceHandle {
    match kind {
        ResourceKind::Texture => TextureHandle::new(index as u32, generation).into(),
        ResourceKind::Buffer => BufferHandle::new(index as u32, generation).into(),
    }
}
