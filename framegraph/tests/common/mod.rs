//! Common utilities for frame graph integration tests.
//!
//! Every test runs against the reference collaborators: a
//! [`TransientResourcePool`] for allocations and a [`DummyEncoder`] recording
//! the command stream.

#![allow(dead_code)]

use std::sync::Once;

use redlilium_framegraph::{
    BufferDescriptor, BufferUsage, ClearValue, DummyEncoder, EncodedCommand, Extent3d,
    FrameGraph, FrameGraphConfig, FrameReport, GpuTexture, GraphError, RenderContext,
    TextureDescriptor, TextureFormat, TextureHandle, TextureUsage, TransientResourcePool,
};

static LOGGER: Once = Once::new();

/// Route `log` output through the test harness.
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Trace)
            .try_init();
    });
}

// ============================================================================
// Descriptors
// ============================================================================

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 180;

pub fn color_target() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        WIDTH,
        HEIGHT,
        TextureFormat::Rgba16Float,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::SAMPLED | TextureUsage::INPUT_ATTACHMENT,
    )
}

pub fn cleared_color_target() -> TextureDescriptor {
    color_target().with_clear(ClearValue::color(0.0, 0.0, 0.0, 1.0))
}

pub fn depth_target() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        WIDTH,
        HEIGHT,
        TextureFormat::Depth32Float,
        TextureUsage::RENDER_ATTACHMENT,
    )
    .with_clear(ClearValue::depth(1.0))
}

pub fn storage_texture() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        WIDTH,
        HEIGHT,
        TextureFormat::Rgba16Float,
        TextureUsage::STORAGE | TextureUsage::SAMPLED,
    )
}

pub fn storage_buffer(size: u64) -> BufferDescriptor {
    BufferDescriptor::new(size, BufferUsage::STORAGE)
}

// ============================================================================
// Harness
// ============================================================================

/// Pool, encoder and per-frame context shared by consecutive frames.
pub struct Harness {
    pub graph: FrameGraph,
    pub pool: TransientResourcePool,
    pub encoder: DummyEncoder,
    frame_index: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(FrameGraphConfig::default())
    }

    pub fn with_config(config: FrameGraphConfig) -> Self {
        init_logging();
        Self {
            graph: FrameGraph::with_config(config),
            pool: TransientResourcePool::new(),
            encoder: DummyEncoder::new(),
            frame_index: 0,
        }
    }

    /// Import a fresh swapchain image for the current frame.
    pub fn backbuffer(&mut self) -> TextureHandle {
        self.graph
            .import_texture(GpuTexture(0xB00 + self.frame_index), color_target())
    }

    /// Execute the declared frame; the encoder stream is kept for inspection.
    pub fn execute(&mut self) -> Result<FrameReport, GraphError> {
        self.encoder.take_commands();
        let ctx = RenderContext::new(self.frame_index, Extent3d::new_2d(WIDTH, HEIGHT));
        self.frame_index += 1;
        self.graph.execute(&ctx, &mut self.pool, &mut self.encoder)
    }

    pub fn commands(&self) -> &[EncodedCommand] {
        self.encoder.commands()
    }

    /// Index of the first command matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&EncodedCommand) -> bool) -> Option<usize> {
        self.commands().iter().position(predicate)
    }
}
