//! Common types shared across the frame graph.

// ============================================================================
// Extent3d
// ============================================================================

/// 3D extent for textures and render outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels (1 for 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

// ============================================================================
// Clear Values
// ============================================================================

/// Clear value requested by a texture descriptor.
///
/// [`ClearValue::None`] means the texture does not ask to be cleared; an
/// attachment that overwrites it then loads with `DontCare`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClearValue {
    /// No clear requested.
    #[default]
    None,
    /// Clear a color attachment with RGBA values.
    Color { r: f32, g: f32, b: f32, a: f32 },
    /// Clear a depth attachment.
    Depth(f32),
    /// Clear a stencil attachment.
    Stencil(u32),
    /// Clear depth and stencil.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Color clear value.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color { r, g, b, a }
    }

    /// Depth clear value.
    pub fn depth(value: f32) -> Self {
        Self::Depth(value)
    }

    /// Combined depth/stencil clear value.
    pub fn depth_stencil(depth: f32, stencil: u32) -> Self {
        Self::DepthStencil { depth, stencil }
    }

    /// Returns true if a clear was requested.
    pub fn is_requested(&self) -> bool {
        !matches!(self, Self::None)
    }
}

// ============================================================================
// Attachment Operations
// ============================================================================

/// What a render pass does with an attachment's previous contents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Preserve existing contents.
    #[default]
    Load,
    /// Overwrite with a clear value.
    Clear(ClearValue),
    /// Contents are undefined; the pass overwrites everything it needs.
    DontCare,
}

/// What a render pass does with an attachment's contents when it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Write results back to memory.
    #[default]
    Store,
    /// Results may be discarded.
    DontCare,
}

/// Inferred load/store pair for one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttachmentOps {
    /// Load action at the start of the pass.
    pub load: LoadOp,
    /// Store action at the end of the pass.
    pub store: StoreOp,
}

impl AttachmentOps {
    /// Create a load/store pair.
    pub fn new(load: LoadOp, store: StoreOp) -> Self {
        Self { load, store }
    }
}
