//! Frame graph configuration.

use crate::types::Extent3d;

/// Switches for the optional compiler stages.
///
/// All optimizations are enabled by default. Disabling one is mostly useful
/// for debugging: a frame that renders correctly only with culling or merging
/// off points at a missing read/write declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGraphConfig {
    /// Cull passes whose outputs are never consumed.
    pub enable_culling: bool,
    /// Merge adjacent compatible raster passes into one native render pass.
    pub enable_pass_merging: bool,
    /// Honor async compute requests; when off every pass runs on the graphics queue.
    pub enable_async_compute: bool,
    /// Dump the compiled execution plan at debug level every frame.
    pub log_execution_plan: bool,
}

impl Default for FrameGraphConfig {
    fn default() -> Self {
        Self {
            enable_culling: true,
            enable_pass_merging: true,
            enable_async_compute: true,
            log_execution_plan: false,
        }
    }
}

impl FrameGraphConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable pass culling.
    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.enable_culling = enabled;
        self
    }

    /// Enable or disable raster pass merging.
    pub fn with_pass_merging(mut self, enabled: bool) -> Self {
        self.enable_pass_merging = enabled;
        self
    }

    /// Enable or disable the async compute queue.
    pub fn with_async_compute(mut self, enabled: bool) -> Self {
        self.enable_async_compute = enabled;
        self
    }

    /// Enable or disable execution plan logging.
    pub fn with_execution_plan_logging(mut self, enabled: bool) -> Self {
        self.log_execution_plan = enabled;
        self
    }
}

/// Per-frame values handed to every pass callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderContext {
    /// Monotonic frame counter supplied by the caller.
    pub frame_index: u64,
    /// Size of the final output.
    pub extent: Extent3d,
}

impl RenderContext {
    /// Create a render context.
    pub fn new(frame_index: u64, extent: Extent3d) -> Self {
        Self {
            frame_index,
            extent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_everything_but_logging() {
        let config = FrameGraphConfig::new();
        assert!(config.enable_culling);
        assert!(config.enable_pass_merging);
        assert!(config.enable_async_compute);
        assert!(!config.log_execution_plan);
    }

    #[test]
    fn test_builder() {
        let config = FrameGraphConfig::new()
            .with_culling(false)
            .with_async_compute(false)
            .with_execution_plan_logging(true);
        assert!(!config.enable_culling);
        assert!(config.enable_pass_merging);
        assert!(!config.enable_async_compute);
        assert!(config.log_execution_plan);
    }
}
