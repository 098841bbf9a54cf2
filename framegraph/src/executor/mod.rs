//! Frame execution.
//!
//! Walks the compiled plan in declaration order and drives every surviving
//! pass through `Pending -> PreExecute -> Running -> PostExecute -> Done`:
//!
//! - **PreExecute** leases the pass's transient resources, switches to the
//!   async stream for async compute passes, waits on the fence of the producer
//!   it depends on and opens (or advances) the native render pass.
//! - **Running** invokes the execute callback exactly once.
//! - **PostExecute** closes the render pass after the last member of a merge
//!   group, signals a fence when another queue waits on the pass (once per
//!   merge group, after its render pass), submits the async stream and
//!   returns dead resources to the pool.
//!
//! A [`FrameGuard`] owns the cleanup: whatever happens during the walk,
//! open encoder scopes are closed, every resource still leased goes back to
//! the pool and the graph is reset for the next frame.

mod context;

pub use context::PassContext;

use std::fmt;

use redlilium_core::profiling::{frame_mark, profile_scope, profile_scope_dynamic};

use crate::backend::{
    ColorTarget, CommandEncoder, DepthTarget, GpuFence, QueueType, RenderPassDesc, ResourcePool,
};
use crate::compiler::{self, CompiledGraph, ReleasePoint, ResourceCompileInfo};
use crate::config::RenderContext;
use crate::error::GraphError;
use crate::graph::{
    ColorAccess, DepthAccess, FrameGraph, PassHandle, PassRecord, PhysicalResource,
    ResourceDescriptor, ResourceHandle, ResourceRegistry,
};

use context::bound_texture;

// ============================================================================
// Pass State and Frame Report
// ============================================================================

/// Execution state of a pass within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// Not started.
    Pending,
    /// Leasing resources, switching streams, waiting on fences and opening
    /// the render pass.
    PreExecute,
    /// Inside the execute callback.
    Running,
    /// Closing scopes, signaling fences and releasing resources.
    PostExecute,
    /// Finished.
    Done,
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::PreExecute => write!(f, "pre-execute"),
            Self::Running => write!(f, "running"),
            Self::PostExecute => write!(f, "post-execute"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Summary of one executed frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Labels of executed passes, in execution order.
    pub executed: Vec<String>,
    /// Labels of culled passes, in declaration order.
    pub culled: Vec<String>,
    /// Number of merged native render passes.
    pub merge_groups: usize,
    /// Number of fences signaled.
    pub fences: usize,
    /// Transient resources leased from the pool.
    pub resources_created: usize,
    /// Transient resources returned to the pool by the schedule.
    pub resources_released: usize,
}

impl FrameReport {
    fn new(compiled: &CompiledGraph, passes: &[PassRecord]) -> Self {
        Self {
            executed: Vec::with_capacity(compiled.execution_order().len()),
            culled: passes
                .iter()
                .filter(|record| compiled.is_culled(record.handle))
                .map(|record| record.label.clone())
                .collect(),
            merge_groups: compiled.merge_groups().len(),
            ..Self::default()
        }
    }

    /// Returns true if a pass with this label ran.
    pub fn was_executed(&self, label: &str) -> bool {
        self.executed.iter().any(|executed| executed == label)
    }

    /// Returns true if a pass with this label was culled.
    pub fn was_culled(&self, label: &str) -> bool {
        self.culled.iter().any(|culled| culled == label)
    }
}

// ============================================================================
// Frame Entry Point
// ============================================================================

/// Compile and execute `graph`, then reset it.
pub(crate) fn execute_frame(
    graph: &mut FrameGraph,
    render: &RenderContext,
    pool: &mut dyn ResourcePool,
    encoder: &mut dyn CommandEncoder,
) -> Result<FrameReport, GraphError> {
    let result = {
        profile_scope!("framegraph::execute");
        let mut guard = FrameGuard {
            graph,
            pool,
            encoder,
            scopes: OpenScopes::default(),
        };
        guard.run(render)
    };
    frame_mark!();

    if let Ok(report) = &result {
        log::trace!(
            "Frame {} executed {} passes ({} culled)",
            render.frame_index,
            report.executed.len(),
            report.culled.len()
        );
    }
    result
}

#[derive(Debug, Default)]
struct OpenScopes {
    render_pass: bool,
    async_stream: bool,
    debug_groups: u32,
}

/// Frame cleanup that runs on every exit path, including unwinding.
struct FrameGuard<'a> {
    graph: &'a mut FrameGraph,
    pool: &'a mut dyn ResourcePool,
    encoder: &'a mut dyn CommandEncoder,
    scopes: OpenScopes,
}

impl FrameGuard<'_> {
    fn run(&mut self, render: &RenderContext) -> Result<FrameReport, GraphError> {
        let FrameGraph {
            config,
            passes,
            registry,
            compiled,
        } = &mut *self.graph;

        compiler::compile_into(passes.as_slice(), registry, config, compiled.activate())?;
        let compiled = compiled.inner();
        if config.log_execution_plan {
            compiler::log_execution_plan(compiled, passes.as_slice(), registry);
        }

        let walk = FrameWalk {
            fences: vec![None; passes.len()],
            report: FrameReport::new(compiled, passes.as_slice()),
            passes: passes.as_mut_slice(),
            registry,
            compiled,
            pool: &mut *self.pool,
            encoder: &mut *self.encoder,
            scopes: &mut self.scopes,
            render,
        };
        walk.execute()
    }

    fn close_scopes(&mut self) {
        for _ in 0..self.scopes.debug_groups {
            self.encoder.end_debug_group();
        }
        if self.scopes.render_pass
            && let Err(error) = self.encoder.end_render_pass()
        {
            log::warn!("Failed to close render pass during frame cleanup: {}", error);
        }
        if self.scopes.async_stream
            && let Err(error) = self.encoder.submit_async_stream()
        {
            log::warn!("Failed to submit async stream during frame cleanup: {}", error);
        }
        self.scopes = OpenScopes::default();
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.close_scopes();

        let leased = self.graph.registry.drain_leased();
        if !leased.is_empty() {
            log::debug!(
                "Returning {} resources still leased at frame end",
                leased.len()
            );
        }
        for physical in leased {
            match physical {
                PhysicalResource::Texture(texture) => self.pool.release_texture(texture),
                PhysicalResource::Buffer(buffer) => self.pool.release_buffer(buffer),
            }
        }

        self.graph.reset();
    }
}

// ============================================================================
// Pass Walk
// ============================================================================

struct FrameWalk<'f> {
    passes: &'f mut [PassRecord],
    registry: &'f mut ResourceRegistry,
    compiled: &'f CompiledGraph,
    pool: &'f mut dyn ResourcePool,
    encoder: &'f mut dyn CommandEncoder,
    scopes: &'f mut OpenScopes,
    render: &'f RenderContext,
    /// Fence signaled after each pass, indexed by pass ordinal.
    fences: Vec<Option<GpuFence>>,
    report: FrameReport,
}

impl FrameWalk<'_> {
    fn execute(mut self) -> Result<FrameReport, GraphError> {
        let compiled = self.compiled;
        for &pass in compiled.execution_order() {
            self.execute_pass(pass)?;
        }
        self.finish_frame()?;
        Ok(self.report)
    }

    fn execute_pass(&mut self, pass: PassHandle) -> Result<(), GraphError> {
        profile_scope_dynamic!(self.passes[pass.slot()].label.as_str());

        let mut state = PassState::Pending;
        loop {
            state = match state {
                PassState::Pending => PassState::PreExecute,
                PassState::PreExecute => {
                    self.pre_execute(pass)?;
                    PassState::Running
                }
                PassState::Running => {
                    self.run_callback(pass)?;
                    PassState::PostExecute
                }
                PassState::PostExecute => {
                    self.post_execute(pass)?;
                    PassState::Done
                }
                PassState::Done => return Ok(()),
            };
            log::trace!("Pass '{}': {}", self.passes[pass.slot()].label, state);
        }
    }

    fn pre_execute(&mut self, pass: PassHandle) -> Result<(), GraphError> {
        let compiled = self.compiled;
        let info = &compiled.passes[pass.slot()];

        for &resource in &info.creates {
            self.create(resource)?;
        }

        if info.queue == QueueType::AsyncCompute {
            self.encoder.flush()?;
            self.encoder.begin_async_stream()?;
            self.scopes.async_stream = true;
        }

        match info.merge_group {
            Some(group) => {
                let members = compiled.merge_groups[group].passes();
                if members.first() == Some(&pass) {
                    // Waits cannot be recorded inside the render pass.
                    for &member in members {
                        self.wait_for_producer(member)?;
                    }
                    self.begin_render_pass(members)?;
                } else {
                    self.encoder.next_subpass()?;
                }
            }
            None => {
                self.wait_for_producer(pass)?;
                if self.passes[pass.slot()].is_raster() {
                    self.begin_render_pass(&[pass])?;
                }
            }
        }

        self.encoder
            .begin_debug_group(&self.passes[pass.slot()].label);
        self.scopes.debug_groups += 1;
        Ok(())
    }

    fn run_callback(&mut self, pass: PassHandle) -> Result<(), GraphError> {
        let queue = self.compiled.passes[pass.slot()].queue;
        let PassRecord {
            label,
            data,
            executor,
            ..
        } = &mut self.passes[pass.slot()];

        let Some(executor) = executor.as_mut() else {
            return Err(GraphError::MissingExecuteCallback {
                pass: label.clone(),
            });
        };

        let mut ctx = PassContext {
            encoder: &mut *self.encoder,
            registry: &*self.registry,
            render: self.render,
            pass,
            label: label.as_str(),
            queue,
        };
        if let Err(error) = executor.execute(&**data, &mut ctx) {
            log::error!("Pass '{}' failed: {}", label, error);
            return Err(GraphError::PassFailed {
                pass: label.clone(),
                source: error,
            });
        }

        self.report.executed.push(label.clone());
        Ok(())
    }

    fn post_execute(&mut self, pass: PassHandle) -> Result<(), GraphError> {
        let compiled = self.compiled;
        let info = &compiled.passes[pass.slot()];

        self.encoder.end_debug_group();
        self.scopes.debug_groups = self.scopes.debug_groups.saturating_sub(1);

        let members: &[PassHandle] = match info.merge_group {
            Some(group) => compiled.merge_groups[group].passes(),
            None => std::slice::from_ref(&pass),
        };
        let closes_render_pass = members.last() == Some(&pass);
        if self.passes[pass.slot()].is_raster() && closes_render_pass {
            self.encoder.end_render_pass()?;
            self.scopes.render_pass = false;
        }

        // Group members signal once, after the shared render pass has ended.
        if closes_render_pass {
            let signaled: Vec<PassHandle> = members
                .iter()
                .copied()
                .filter(|member| compiled.passes[member.slot()].needs_fence)
                .collect();
            if !signaled.is_empty() {
                let fence = self.encoder.create_fence(info.queue)?;
                for member in signaled {
                    self.fences[member.slot()] = Some(fence);
                }
                self.report.fences += 1;
            }
        }

        if info.queue == QueueType::AsyncCompute {
            self.encoder.submit_async_stream()?;
            self.scopes.async_stream = false;
        }

        for &resource in &info.releases {
            self.release(resource);
        }
        Ok(())
    }

    /// Release end-of-frame resources and submit the main stream.
    fn finish_frame(&mut self) -> Result<(), GraphError> {
        let compiled = self.compiled;
        let mut waited: Vec<PassHandle> = Vec::new();

        for &resource in compiled.end_of_frame_releases() {
            if let Some(ReleasePoint::EndOfFrame { wait_on }) = compiled
                .resource(resource)
                .and_then(ResourceCompileInfo::release)
                && !waited.contains(&wait_on)
            {
                let fence = self.fence_of(wait_on, "end of frame")?;
                self.encoder.wait_on_fence(QueueType::Graphics, fence)?;
                waited.push(wait_on);
            }
            self.release(resource);
        }

        if !compiled.is_empty() {
            self.encoder.flush()?;
        }
        Ok(())
    }

    fn wait_for_producer(&mut self, pass: PassHandle) -> Result<(), GraphError> {
        let info = &self.compiled.passes[pass.slot()];
        let Some(producer) = info.sync_to else {
            return Ok(());
        };

        let fence = self.fence_of(producer, &self.passes[pass.slot()].label)?;
        log::trace!(
            "Pass '{}' waits on '{}' ({:?})",
            self.passes[pass.slot()].label,
            self.passes[producer.slot()].label,
            fence
        );
        self.encoder.wait_on_fence(info.queue, fence)?;
        Ok(())
    }

    fn fence_of(&self, producer: PassHandle, waiter: &str) -> Result<GpuFence, GraphError> {
        self.fences[producer.slot()].ok_or_else(|| GraphError::MissingFence {
            pass: waiter.to_owned(),
            producer: self.passes[producer.slot()].label.clone(),
        })
    }

    /// Open one native render pass covering `members`.
    ///
    /// Attachments come from the first member; loads from the first member's
    /// inferred actions and stores from the last member's.
    fn begin_render_pass(&mut self, members: &[PassHandle]) -> Result<(), GraphError> {
        let (Some(&first), Some(&last)) = (members.first(), members.last()) else {
            return Ok(());
        };
        let first_info = &self.compiled.passes[first.slot()];
        let last_info = &self.compiled.passes[last.slot()];
        let head = &self.passes[first.slot()];

        let mut color_targets = Vec::new();
        for (slot, attachment) in head.color_attachments.iter().enumerate() {
            let Some(attachment) = attachment else {
                continue;
            };
            let input = members.iter().any(|member| {
                self.passes[member.slot()].color_attachments[slot]
                    .is_some_and(|a| a.access == ColorAccess::Read)
            });
            color_targets.push(ColorTarget {
                slot: slot as u8,
                texture: bound_texture(self.registry, attachment.texture)?,
                load: first_info.color_ops(slot).unwrap_or_default().load,
                store: last_info.color_ops(slot).unwrap_or_default().store,
                input,
            });
        }

        let depth_target = match head.depth_attachment {
            Some(attachment) => Some(DepthTarget {
                texture: bound_texture(self.registry, attachment.texture)?,
                load: first_info.depth_ops().unwrap_or_default().load,
                store: last_info.depth_ops().unwrap_or_default().store,
                read_only: attachment.access == DepthAccess::ReadOnly,
            }),
            None => None,
        };

        let desc = RenderPassDesc {
            label: head.label.clone(),
            color_targets,
            depth_target,
            subpass_count: members.len() as u32,
        };
        self.encoder.begin_render_pass(&desc)?;
        self.scopes.render_pass = true;
        Ok(())
    }

    fn create(&mut self, resource: ResourceHandle) -> Result<(), GraphError> {
        let physical = match self.registry.descriptor(resource) {
            Some(ResourceDescriptor::Texture(desc)) => {
                PhysicalResource::Texture(self.pool.get_texture(desc)?)
            }
            Some(ResourceDescriptor::Buffer(desc)) => {
                PhysicalResource::Buffer(self.pool.get_buffer(desc)?)
            }
            None => return Err(GraphError::InvalidHandle(resource)),
        };
        log::trace!(
            "Create {} -> {:?}",
            self.registry.display_name(resource),
            physical
        );
        self.registry.bind(resource, physical);
        self.report.resources_created += 1;
        Ok(())
    }

    fn release(&mut self, resource: ResourceHandle) {
        match self.registry.unbind(resource) {
            Some(PhysicalResource::Texture(texture)) => self.pool.release_texture(texture),
            Some(PhysicalResource::Buffer(buffer)) => self.pool.release_buffer(buffer),
            None => {
                log::warn!(
                    "Release of {} skipped: not bound",
                    self.registry.display_name(resource)
                );
                return;
            }
        }
        log::trace!("Release {}", self.registry.display_name(resource));
        self.report.resources_released += 1;
    }
}
