//! Descriptor-keyed transient resource pool.

use std::collections::HashMap;

use crate::types::{BufferDescriptor, BufferKey, TextureDescriptor, TextureKey};

use super::{BackendError, GpuBuffer, GpuTexture, ResourcePool};

/// Allocation counters of a [`TransientResourcePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Textures allocated from scratch.
    pub textures_allocated: u64,
    /// Buffers allocated from scratch.
    pub buffers_allocated: u64,
    /// Leases satisfied from a free list.
    pub reuses: u64,
}

/// A [`ResourcePool`] that recycles resources through per-descriptor free lists.
///
/// Identifiers are handed out sequentially; a real backend would wrap its
/// native objects the same way. An optional capacity limit makes allocation
/// fail with [`BackendError::OutOfMemory`] once reached.
#[derive(Debug, Default)]
pub struct TransientResourcePool {
    free_textures: HashMap<TextureKey, Vec<GpuTexture>>,
    free_buffers: HashMap<BufferKey, Vec<GpuBuffer>>,
    leased_textures: HashMap<GpuTexture, TextureKey>,
    leased_buffers: HashMap<GpuBuffer, BufferKey>,
    next_id: u64,
    capacity: Option<usize>,
    stats: PoolStats,
}

impl TransientResourcePool {
    /// Create an empty pool without a capacity limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of resources the pool may ever allocate.
    pub fn with_capacity_limit(mut self, limit: usize) -> Self {
        self.capacity = Some(limit);
        self
    }

    /// Textures currently leased.
    pub fn leased_texture_count(&self) -> usize {
        self.leased_textures.len()
    }

    /// Buffers currently leased.
    pub fn leased_buffer_count(&self) -> usize {
        self.leased_buffers.len()
    }

    /// Total leased resources.
    pub fn leased_count(&self) -> usize {
        self.leased_texture_count() + self.leased_buffer_count()
    }

    /// Resources sitting in free lists.
    pub fn free_count(&self) -> usize {
        self.free_textures.values().map(Vec::len).sum::<usize>()
            + self.free_buffers.values().map(Vec::len).sum::<usize>()
    }

    /// Whether `texture` is currently leased.
    pub fn is_texture_leased(&self, texture: GpuTexture) -> bool {
        self.leased_textures.contains_key(&texture)
    }

    /// Allocation counters.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Drop every free resource. Leased resources are unaffected.
    pub fn trim(&mut self) {
        let freed = self.free_count();
        self.free_textures.clear();
        self.free_buffers.clear();
        if freed > 0 {
            log::debug!("TransientResourcePool: trimmed {} free resources", freed);
        }
    }

    fn allocated(&self) -> usize {
        (self.stats.textures_allocated + self.stats.buffers_allocated) as usize
    }

    fn allocate_id(&mut self) -> Result<u64, BackendError> {
        if self.capacity.is_some_and(|limit| self.allocated() >= limit) {
            return Err(BackendError::OutOfMemory);
        }
        self.next_id += 1;
        Ok(self.next_id)
    }
}

impl ResourcePool for TransientResourcePool {
    fn get_texture(&mut self, descriptor: &TextureDescriptor) -> Result<GpuTexture, BackendError> {
        let key = descriptor.pool_key();
        let texture = match self.free_textures.get_mut(&key).and_then(Vec::pop) {
            Some(texture) => {
                self.stats.reuses += 1;
                texture
            }
            None => {
                let texture = GpuTexture(self.allocate_id()?);
                self.stats.textures_allocated += 1;
                log::trace!(
                    "TransientResourcePool: allocated texture {:?} {:?} ({}x{}x{} {:?})",
                    texture,
                    descriptor.label,
                    descriptor.size.width,
                    descriptor.size.height,
                    descriptor.size.depth,
                    descriptor.format
                );
                texture
            }
        };
        self.leased_textures.insert(texture, key);
        Ok(texture)
    }

    fn get_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, BackendError> {
        let key = descriptor.pool_key();
        let buffer = match self.free_buffers.get_mut(&key).and_then(Vec::pop) {
            Some(buffer) => {
                self.stats.reuses += 1;
                buffer
            }
            None => {
                let buffer = GpuBuffer(self.allocate_id()?);
                self.stats.buffers_allocated += 1;
                log::trace!(
                    "TransientResourcePool: allocated buffer {:?} {:?} (size: {})",
                    buffer,
                    descriptor.label,
                    descriptor.size
                );
                buffer
            }
        };
        self.leased_buffers.insert(buffer, key);
        Ok(buffer)
    }

    fn release_texture(&mut self, texture: GpuTexture) {
        match self.leased_textures.remove(&texture) {
            Some(key) => self.free_textures.entry(key).or_default().push(texture),
            None => log::warn!(
                "TransientResourcePool: release of texture {:?} that is not leased",
                texture
            ),
        }
    }

    fn release_buffer(&mut self, buffer: GpuBuffer) {
        match self.leased_buffers.remove(&buffer) {
            Some(key) => self.free_buffers.entry(key).or_default().push(buffer),
            None => log::warn!(
                "TransientResourcePool: release of buffer {:?} that is not leased",
                buffer
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, TextureFormat, TextureUsage};

    fn color_desc(width: u32) -> TextureDescriptor {
        TextureDescriptor::new_2d(
            width,
            width,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT,
        )
    }

    #[test]
    fn test_released_texture_is_reused() {
        let mut pool = TransientResourcePool::new();
        let first = pool.get_texture(&color_desc(64)).unwrap();
        pool.release_texture(first);

        let second = pool
            .get_texture(&color_desc(64).with_label("other"))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.stats().reuses, 1);
        assert_eq!(pool.stats().textures_allocated, 1);
    }

    #[test]
    fn test_leased_texture_is_never_handed_out_twice() {
        let mut pool = TransientResourcePool::new();
        let a = pool.get_texture(&color_desc(64)).unwrap();
        let b = pool.get_texture(&color_desc(64)).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.leased_texture_count(), 2);
    }

    #[test]
    fn test_different_descriptor_allocates() {
        let mut pool = TransientResourcePool::new();
        let a = pool.get_texture(&color_desc(64)).unwrap();
        pool.release_texture(a);
        let b = pool.get_texture(&color_desc(128)).unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.free_count(), 1);

        let mipped = pool.get_texture(&color_desc(64).with_mip_levels(4)).unwrap();
        assert_ne!(a, mipped);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_buffer_round_trip() {
        let mut pool = TransientResourcePool::new();
        let desc = BufferDescriptor::new(4096, BufferUsage::STORAGE);
        let buffer = pool.get_buffer(&desc).unwrap();
        assert_eq!(pool.leased_buffer_count(), 1);
        pool.release_buffer(buffer);
        assert_eq!(pool.leased_count(), 0);
        assert_eq!(pool.get_buffer(&desc).unwrap(), buffer);
    }

    #[test]
    fn test_unknown_release_is_ignored() {
        let mut pool = TransientResourcePool::new();
        pool.release_texture(GpuTexture(42));
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_capacity_limit() {
        let mut pool = TransientResourcePool::new().with_capacity_limit(1);
        let a = pool.get_texture(&color_desc(16)).unwrap();
        assert_eq!(
            pool.get_texture(&color_desc(16)),
            Err(BackendError::OutOfMemory)
        );
        // Recycling still works at the limit.
        pool.release_texture(a);
        assert!(pool.get_texture(&color_desc(16)).is_ok());
    }

    #[test]
    fn test_trim_keeps_leases() {
        let mut pool = TransientResourcePool::new();
        let a = pool.get_texture(&color_desc(16)).unwrap();
        let b = pool.get_texture(&color_desc(16)).unwrap();
        pool.release_texture(a);
        pool.trim();
        assert_eq!(pool.free_count(), 0);
        assert!(pool.is_texture_leased(b));
    }
}
