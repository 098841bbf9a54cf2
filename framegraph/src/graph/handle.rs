//! Frame-local handles to passes and resources.
//!
//! Handles are plain `Copy` indices stamped with the generation of the frame
//! that issued them. The graph bumps its generation whenever a frame is
//! executed or reset, so a handle kept across frames is caught at compile
//! time instead of silently aliasing a different resource.

use std::fmt;

/// Handle to a pass in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(u32);

impl PassHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Ordinal of the pass; passes run in ascending ordinal order.
    pub fn index(&self) -> u32 {
        self.0
    }

    pub(crate) fn slot(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pass#{}", self.0)
    }
}

/// Kind of a graph resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Buffer,
}

/// Handle to a texture in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    index: u32,
    generation: u32,
}

/// Handle to a buffer in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    index: u32,
    generation: u32,
}

/// Kind-erased resource handle used in pass declarations and compile tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    kind: ResourceKind,
    index: u32,
    generation: u32,
}

impl TextureHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Index into the frame's resource table.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the frame that issued this handle.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl BufferHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Index into the frame's resource table.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the frame that issued this handle.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl ResourceHandle {
    /// Resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Index into the frame's resource table.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the frame that issued this handle.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The texture handle, if this is a texture.
    pub fn as_texture(&self) -> Option<TextureHandle> {
        (self.kind == ResourceKind::Texture).then(|| TextureHandle::new(self.index, self.generation))
    }

    /// The buffer handle, if this is a buffer.
    pub fn as_buffer(&self) -> Option<BufferHandle> {
        (self.kind == ResourceKind::Buffer).then(|| BufferHandle::new(self.index, self.generation))
    }

    pub(crate) fn slot(&self) -> usize {
        self.index as usize
    }
}

impl From<TextureHandle> for ResourceHandle {
    fn from(handle: TextureHandle) -> Self {
        Self {
            kind: ResourceKind::Texture,
            index: handle.index,
            generation: handle.generation,
        }
    }
}

impl From<BufferHandle> for ResourceHandle {
    fn from(handle: BufferHandle) -> Self {
        Self {
            kind: ResourceKind::Buffer,
            index: handle.index,
            generation: handle.generation,
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::Texture => write!(f, "texture#{}", self.index),
            ResourceKind::Buffer => write!(f, "buffer#{}", self.index),
        }
    }
}

static_assertions::assert_impl_all!(PassHandle: Send, Sync, Copy);
static_assertions::assert_impl_all!(ResourceHandle: Send, Sync, Copy);
