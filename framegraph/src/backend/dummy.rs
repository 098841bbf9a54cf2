//! Dummy command encoder for testing and development.
//!
//! Records every command it receives instead of talking to a GPU, and checks
//! that scopes nest properly (render passes, async streams, debug groups) so
//! tests can assert on the exact stream the executor produced.

use super::{
    BackendError, CommandEncoder, GpuBuffer, GpuFence, GpuTexture, QueueType, RenderPassDesc,
};

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedCommand {
    BeginRenderPass(RenderPassDesc),
    NextSubpass,
    EndRenderPass,
    Flush,
    BeginAsyncStream,
    SubmitAsyncStream,
    CreateFence { queue: QueueType, fence: GpuFence },
    WaitOnFence { queue: QueueType, fence: GpuFence },
    BeginDebugGroup(String),
    EndDebugGroup,
    Draw { vertex_count: u32, instance_count: u32 },
    Dispatch { x: u32, y: u32, z: u32 },
    TraceRays { width: u32, height: u32, depth: u32 },
    CopyBuffer { src: GpuBuffer, dst: GpuBuffer, size: u64 },
    CopyTexture { src: GpuTexture, dst: GpuTexture },
}

/// Recording [`CommandEncoder`].
#[derive(Debug, Default)]
pub struct DummyEncoder {
    commands: Vec<EncodedCommand>,
    open_subpasses: Option<(u32, u32)>,
    async_open: bool,
    debug_depth: u32,
    next_fence: u64,
}

impl DummyEncoder {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Encoder"
    }

    /// Commands recorded so far.
    pub fn commands(&self) -> &[EncodedCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving the encoder ready for the next frame.
    pub fn take_commands(&mut self) -> Vec<EncodedCommand> {
        self.open_subpasses = None;
        self.async_open = false;
        self.debug_depth = 0;
        std::mem::take(&mut self.commands)
    }

    /// Number of commands matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&EncodedCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(*c)).count()
    }

    /// Render passes opened so far.
    pub fn render_passes(&self) -> Vec<&RenderPassDesc> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                EncodedCommand::BeginRenderPass(desc) => Some(desc),
                _ => None,
            })
            .collect()
    }

    /// Labels of debug groups opened so far, in order.
    pub fn debug_groups(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                EncodedCommand::BeginDebugGroup(label) => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Whether a render pass is currently open.
    pub fn in_render_pass(&self) -> bool {
        self.open_subpasses.is_some()
    }

    /// Whether the async stream is currently open.
    pub fn in_async_stream(&self) -> bool {
        self.async_open
    }

    fn push(&mut self, command: EncodedCommand) {
        log::trace!("DummyEncoder: {:?}", command);
        self.commands.push(command);
    }
}

impl CommandEncoder for DummyEncoder {
    fn begin_render_pass(&mut self, desc: &RenderPassDesc) -> Result<(), BackendError> {
        if self.open_subpasses.is_some() {
            return Err(BackendError::InvalidState(format!(
                "render pass '{}' begun inside another render pass",
                desc.label
            )));
        }
        self.open_subpasses = Some((1, desc.subpass_count.max(1)));
        self.push(EncodedCommand::BeginRenderPass(desc.clone()));
        Ok(())
    }

    fn next_subpass(&mut self) -> Result<(), BackendError> {
        match &mut self.open_subpasses {
            Some((current, total)) if *current < *total => *current += 1,
            Some(_) => {
                return Err(BackendError::InvalidState(
                    "next subpass past the last subpass".into(),
                ));
            }
            None => {
                return Err(BackendError::InvalidState(
                    "next subpass outside a render pass".into(),
                ));
            }
        }
        self.push(EncodedCommand::NextSubpass);
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<(), BackendError> {
        if self.open_subpasses.take().is_none() {
            return Err(BackendError::InvalidState(
                "end render pass without an open render pass".into(),
            ));
        }
        self.push(EncodedCommand::EndRenderPass);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BackendError> {
        if self.open_subpasses.is_some() {
            return Err(BackendError::InvalidState(
                "flush inside a render pass".into(),
            ));
        }
        self.push(EncodedCommand::Flush);
        Ok(())
    }

    fn begin_async_stream(&mut self) -> Result<(), BackendError> {
        if self.async_open {
            return Err(BackendError::InvalidState("async stream already open".into()));
        }
        self.async_open = true;
        self.push(EncodedCommand::BeginAsyncStream);
        Ok(())
    }

    fn submit_async_stream(&mut self) -> Result<(), BackendError> {
        if !self.async_open {
            return Err(BackendError::InvalidState("no async stream to submit".into()));
        }
        self.async_open = false;
        self.push(EncodedCommand::SubmitAsyncStream);
        Ok(())
    }

    fn create_fence(&mut self, queue: QueueType) -> Result<GpuFence, BackendError> {
        if self.open_subpasses.is_some() {
            return Err(BackendError::InvalidState(
                "fence signaled inside a render pass".into(),
            ));
        }
        self.next_fence += 1;
        let fence = GpuFence(self.next_fence);
        self.push(EncodedCommand::CreateFence { queue, fence });
        Ok(fence)
    }

    fn wait_on_fence(&mut self, queue: QueueType, fence: GpuFence) -> Result<(), BackendError> {
        if fence.0 == 0 || fence.0 > self.next_fence {
            return Err(BackendError::InvalidState(format!(
                "wait on unknown fence {:?}",
                fence
            )));
        }
        self.push(EncodedCommand::WaitOnFence { queue, fence });
        Ok(())
    }

    fn begin_debug_group(&mut self, label: &str) {
        self.debug_depth += 1;
        self.push(EncodedCommand::BeginDebugGroup(label.to_owned()));
    }

    fn end_debug_group(&mut self) {
        self.debug_depth = self.debug_depth.saturating_sub(1);
        self.push(EncodedCommand::EndDebugGroup);
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.push(EncodedCommand::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push(EncodedCommand::Dispatch { x, y, z });
    }

    fn trace_rays(&mut self, width: u32, height: u32, depth: u32) {
        self.push(EncodedCommand::TraceRays {
            width,
            height,
            depth,
        });
    }

    fn copy_buffer(&mut self, src: GpuBuffer, dst: GpuBuffer, size: u64) {
        self.push(EncodedCommand::CopyBuffer { src, dst, size });
    }

    fn copy_texture(&mut self, src: GpuTexture, dst: GpuTexture) {
        self.push(EncodedCommand::CopyTexture { src, dst });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(subpasses: u32) -> RenderPassDesc {
        RenderPassDesc {
            label: "gbuffer".into(),
            color_targets: Vec::new(),
            depth_target: None,
            subpass_count: subpasses,
        }
    }

    #[test]
    fn test_dummy_encoder_name() {
        assert_eq!(DummyEncoder::new().name(), "Dummy Encoder");
    }

    #[test]
    fn test_render_pass_nesting() {
        let mut encoder = DummyEncoder::new();
        encoder.begin_render_pass(&desc(2)).unwrap();
        assert!(encoder.begin_render_pass(&desc(1)).is_err());
        encoder.next_subpass().unwrap();
        assert!(encoder.next_subpass().is_err());
        encoder.end_render_pass().unwrap();
        assert!(encoder.end_render_pass().is_err());
        assert_eq!(encoder.render_passes().len(), 1);
    }

    #[test]
    fn test_flush_inside_render_pass_fails() {
        let mut encoder = DummyEncoder::new();
        encoder.begin_render_pass(&desc(1)).unwrap();
        assert!(encoder.flush().is_err());
    }

    #[test]
    fn test_fence_inside_render_pass_fails() {
        let mut encoder = DummyEncoder::new();
        encoder.begin_render_pass(&desc(1)).unwrap();
        assert!(encoder.create_fence(QueueType::Graphics).is_err());
        encoder.end_render_pass().unwrap();
        assert!(encoder.create_fence(QueueType::Graphics).is_ok());
    }

    #[test]
    fn test_async_stream_pairing() {
        let mut encoder = DummyEncoder::new();
        assert!(encoder.submit_async_stream().is_err());
        encoder.begin_async_stream().unwrap();
        assert!(encoder.in_async_stream());
        encoder.submit_async_stream().unwrap();
        assert!(!encoder.in_async_stream());
    }

    #[test]
    fn test_fences_are_unique_and_known() {
        let mut encoder = DummyEncoder::new();
        let a = encoder.create_fence(QueueType::AsyncCompute).unwrap();
        let b = encoder.create_fence(QueueType::Graphics).unwrap();
        assert_ne!(a, b);
        encoder.wait_on_fence(QueueType::Graphics, a).unwrap();
        assert!(encoder.wait_on_fence(QueueType::Graphics, GpuFence(99)).is_err());
    }

    #[test]
    fn test_take_commands_resets_state() {
        let mut encoder = DummyEncoder::new();
        encoder.begin_debug_group("frame");
        encoder.begin_render_pass(&desc(1)).unwrap();
        assert_eq!(encoder.take_commands().len(), 2);
        assert!(!encoder.in_render_pass());
        assert!(encoder.commands().is_empty());
    }
}
