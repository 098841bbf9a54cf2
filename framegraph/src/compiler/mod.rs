//! Frame graph compilation.
//!
//! Turns the passes declared for a frame into an execution plan
//! ([`CompiledGraph`]). Passes always run in declaration order; compilation
//! decides everything else:
//!
//! 1. **Validation** - stale or foreign handles, gaps in color attachment slots
//! 2. **Reference counting and culling** - passes whose outputs nobody reads
//!    are removed, transitively
//! 3. **Load/store inference** - attachment actions derived from access intent
//!    and neighbouring passes
//! 4. **Cross-queue synchronization** - the minimal set of fences between the
//!    graphics and async compute queues
//! 5. **Pass merging** - adjacent compatible raster passes share one native
//!    render pass
//! 6. **Lifetime scheduling** - when each transient resource is taken from and
//!    returned to the pool
//!
//! All tables are index-addressed by pass ordinal or resource index and are
//! reset rather than reallocated between frames.

mod culling;
mod lifetime;
mod load_store;
mod merge;
mod sync;

use redlilium_core::pool::{FrameTable, Poolable};
use redlilium_core::profiling::{profile_plot, profile_scope};

use crate::backend::QueueType;
use crate::config::FrameGraphConfig;
use crate::error::GraphError;
use crate::graph::{MAX_COLOR_ATTACHMENTS, PassHandle, PassRecord, ResourceHandle, ResourceRegistry};
use crate::types::AttachmentOps;

// ============================================================================
// Per-Pass Results
// ============================================================================

/// Compile results for one pass.
#[derive(Debug, Clone, Default)]
pub struct PassCompileInfo {
    pub(crate) ref_count: u32,
    pub(crate) culled: bool,
    pub(crate) has_side_effect: bool,
    pub(crate) queue: QueueType,
    pub(crate) sync_to: Option<PassHandle>,
    pub(crate) sync_from: Option<PassHandle>,
    pub(crate) needs_fence: bool,
    pub(crate) creates: Vec<ResourceHandle>,
    pub(crate) releases: Vec<ResourceHandle>,
    pub(crate) merge_group: Option<usize>,
    pub(crate) color_ops: [Option<AttachmentOps>; MAX_COLOR_ATTACHMENTS],
    pub(crate) depth_ops: Option<AttachmentOps>,
}

impl PassCompileInfo {
    /// Outputs still consumed after culling.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Returns true if the pass was removed.
    pub fn is_culled(&self) -> bool {
        self.culled
    }

    /// Returns true if the pass writes an imported resource.
    pub fn has_side_effect(&self) -> bool {
        self.has_side_effect
    }

    /// Queue the pass is submitted to.
    pub fn queue(&self) -> QueueType {
        self.queue
    }

    /// Producer on the other queue this pass must wait for.
    pub fn sync_to(&self) -> Option<PassHandle> {
        self.sync_to
    }

    /// First pass on the other queue that waits for this one.
    pub fn sync_from(&self) -> Option<PassHandle> {
        self.sync_from
    }

    /// Returns true if a fence is created after this pass.
    pub fn needs_fence(&self) -> bool {
        self.needs_fence
    }

    /// Resources taken from the pool right before the pass.
    pub fn creates(&self) -> &[ResourceHandle] {
        &self.creates
    }

    /// Resources returned to the pool right after the pass.
    pub fn releases(&self) -> &[ResourceHandle] {
        &self.releases
    }

    /// Index of the merge group the pass belongs to.
    pub fn merge_group(&self) -> Option<usize> {
        self.merge_group
    }

    /// Inferred actions of the color attachment in `slot`.
    pub fn color_ops(&self, slot: usize) -> Option<AttachmentOps> {
        self.color_ops.get(slot).copied().flatten()
    }

    /// Inferred actions of the depth/stencil attachment.
    pub fn depth_ops(&self) -> Option<AttachmentOps> {
        self.depth_ops
    }
}

impl Poolable for PassCompileInfo {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.ref_count = 0;
        self.culled = false;
        self.has_side_effect = false;
        self.queue = QueueType::Graphics;
        self.sync_to = None;
        self.sync_from = None;
        self.needs_fence = false;
        self.creates.clear();
        self.releases.clear();
        self.merge_group = None;
        self.color_ops = [None; MAX_COLOR_ATTACHMENTS];
        self.depth_ops = None;
    }
}

// ============================================================================
// Per-Resource Results
// ============================================================================

/// When a transient resource goes back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePoint {
    /// Right after the given pass finishes.
    AfterPass(PassHandle),
    /// After the last pass, once the graphics queue has waited on `wait_on`.
    EndOfFrame { wait_on: PassHandle },
}

/// Compile results for one resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceCompileInfo {
    pub(crate) ref_count: u32,
    pub(crate) producers: Vec<PassHandle>,
    pub(crate) consumers: Vec<PassHandle>,
    pub(crate) imported: bool,
    pub(crate) temporary: bool,
    pub(crate) created_at: Option<PassHandle>,
    pub(crate) release: Option<ReleasePoint>,
}

impl ResourceCompileInfo {
    /// Readers still alive after culling.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Passes writing the resource, in execution order.
    pub fn producers(&self) -> &[PassHandle] {
        &self.producers
    }

    /// Passes reading the resource, in execution order.
    pub fn consumers(&self) -> &[PassHandle] {
        &self.consumers
    }

    /// Pass that takes the resource from the pool.
    pub fn created_at(&self) -> Option<PassHandle> {
        self.created_at
    }

    /// When the resource is returned to the pool.
    pub fn release(&self) -> Option<ReleasePoint> {
        self.release
    }

    /// Nearest surviving producer that runs before `pass`.
    pub(crate) fn latest_producer_before(
        &self,
        pass: PassHandle,
        passes: &FrameTable<PassCompileInfo>,
    ) -> Option<PassHandle> {
        self.producers
            .iter()
            .rev()
            .copied()
            .filter(|producer| *producer < pass)
            .find(|producer| !passes[producer.slot()].culled)
    }

    /// Whether any surviving pass after `pass` reads or writes the resource.
    pub(crate) fn has_later_user(
        &self,
        pass: PassHandle,
        passes: &FrameTable<PassCompileInfo>,
    ) -> bool {
        self.producers
            .iter()
            .chain(&self.consumers)
            .any(|user| *user > pass && !passes[user.slot()].culled)
    }

    /// Surviving users, producers and consumers alike, possibly repeated.
    pub(crate) fn live_users<'a>(
        &'a self,
        passes: &'a FrameTable<PassCompileInfo>,
    ) -> impl Iterator<Item = PassHandle> + Clone + 'a {
        self.producers
            .iter()
            .chain(&self.consumers)
            .copied()
            .filter(|user| !passes[user.slot()].culled)
    }
}

impl Poolable for ResourceCompileInfo {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.ref_count = 0;
        self.producers.clear();
        self.consumers.clear();
        self.imported = false;
        self.temporary = false;
        self.created_at = None;
        self.release = None;
    }
}

/// Contiguous raster passes executed as subpasses of one native render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeGroup {
    pub(crate) passes: Vec<PassHandle>,
}

impl MergeGroup {
    /// Member passes in execution order.
    pub fn passes(&self) -> &[PassHandle] {
        &self.passes
    }

    /// First member.
    pub fn first(&self) -> Option<PassHandle> {
        self.passes.first().copied()
    }

    /// Last member.
    pub fn last(&self) -> Option<PassHandle> {
        self.passes.last().copied()
    }
}

impl Poolable for MergeGroup {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.passes.clear();
    }
}

// ============================================================================
// Compiled Graph
// ============================================================================

/// Execution plan for one frame.
#[derive(Debug, Default)]
pub struct CompiledGraph {
    pub(crate) passes: FrameTable<PassCompileInfo>,
    pub(crate) resources: FrameTable<ResourceCompileInfo>,
    pub(crate) merge_groups: FrameTable<MergeGroup>,
    pub(crate) end_of_frame_releases: Vec<ResourceHandle>,
    pub(crate) execution_order: Vec<PassHandle>,
}

impl CompiledGraph {
    /// Compile info of a pass.
    pub fn pass(&self, pass: PassHandle) -> Option<&PassCompileInfo> {
        self.passes.get(pass.slot())
    }

    /// Compile info of every pass, indexed by ordinal.
    pub fn passes(&self) -> &[PassCompileInfo] {
        self.passes.as_slice()
    }

    /// Compile info of a resource.
    pub fn resource(&self, resource: impl Into<ResourceHandle>) -> Option<&ResourceCompileInfo> {
        self.resources.get(resource.into().slot())
    }

    /// Returns true if the pass was culled.
    pub fn is_culled(&self, pass: PassHandle) -> bool {
        self.pass(pass).is_some_and(PassCompileInfo::is_culled)
    }

    /// Surviving passes in execution order.
    pub fn execution_order(&self) -> &[PassHandle] {
        &self.execution_order
    }

    /// Number of culled passes.
    pub fn culled_count(&self) -> usize {
        self.passes.len() - self.execution_order.len()
    }

    /// Merge groups in execution order.
    pub fn merge_groups(&self) -> &[MergeGroup] {
        self.merge_groups.as_slice()
    }

    /// Resources released after the last pass.
    pub fn end_of_frame_releases(&self) -> &[ResourceHandle] {
        &self.end_of_frame_releases
    }

    /// Number of fences the plan creates.
    pub fn fence_count(&self) -> usize {
        self.passes.iter().filter(|p| p.needs_fence).count()
    }

    /// Returns true if nothing survived compilation.
    pub fn is_empty(&self) -> bool {
        self.execution_order.is_empty()
    }
}

impl Poolable for CompiledGraph {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.passes.clear();
        self.resources.clear();
        self.merge_groups.clear();
        self.end_of_frame_releases.clear();
        self.execution_order.clear();
    }
}

// ============================================================================
// Compilation
// ============================================================================

/// Compile the declared passes of a frame into `compiled`.
///
/// `compiled` is reset first; its allocations are reused.
pub(crate) fn compile_into(
    passes: &[PassRecord],
    registry: &ResourceRegistry,
    config: &FrameGraphConfig,
    compiled: &mut CompiledGraph,
) -> Result<(), GraphError> {
    profile_scope!("framegraph::compile");

    compiled.reset();
    validate_declarations(passes, registry)?;

    compiled.passes.resize(passes.len());
    compiled.resources.resize(registry.len());

    culling::count_references(passes, registry, config, compiled);
    if config.enable_culling {
        culling::cull_passes(passes, compiled);
    }
    validate_callbacks(passes, compiled)?;

    load_store::infer_attachment_ops(passes, registry, compiled);
    sync::synchronize_queues(passes, compiled);
    if config.enable_pass_merging {
        merge::find_merge_groups(passes, compiled);
    }
    lifetime::schedule_lifetimes(passes, registry, compiled)?;

    compiled.execution_order.extend(
        passes
            .iter()
            .map(|record| record.handle)
            .filter(|pass| !compiled.passes[pass.slot()].culled),
    );

    profile_plot!("framegraph_culled_passes", compiled.culled_count());
    log::debug!(
        "Compiled frame graph: {} passes ({} culled), {} resources, {} merge groups, {} fences",
        passes.len(),
        compiled.culled_count(),
        registry.len(),
        compiled.merge_groups.len(),
        compiled.fence_count()
    );
    Ok(())
}

fn validate_declarations(passes: &[PassRecord], registry: &ResourceRegistry) -> Result<(), GraphError> {
    for record in passes {
        for handle in record.referenced() {
            registry.validate(handle)?;
        }

        let bound = record
            .color_attachments
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |highest| highest + 1);
        if let Some(slot) = record.color_attachments[..bound]
            .iter()
            .position(Option::is_none)
        {
            return Err(GraphError::MissingAttachmentSlot {
                pass: record.label.clone(),
                slot,
            });
        }
    }
    Ok(())
}

fn validate_callbacks(passes: &[PassRecord], compiled: &CompiledGraph) -> Result<(), GraphError> {
    match passes
        .iter()
        .find(|record| record.executor.is_none() && !compiled.passes[record.handle.slot()].culled)
    {
        Some(record) => Err(GraphError::MissingExecuteCallback {
            pass: record.label.clone(),
        }),
        None => Ok(()),
    }
}

/// Dump the plan at debug level.
pub(crate) fn log_execution_plan(
    compiled: &CompiledGraph,
    passes: &[PassRecord],
    registry: &ResourceRegistry,
) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    let names = |handles: &[ResourceHandle]| {
        handles
            .iter()
            .map(|h| registry.display_name(*h))
            .collect::<Vec<_>>()
            .join(", ")
    };

    log::debug!("=== Frame graph execution plan ===");
    for record in passes {
        let info = &compiled.passes[record.handle.slot()];
        if info.culled {
            log::debug!("  [{:>3}] {} (culled)", record.handle.index(), record.label);
            continue;
        }
        log::debug!(
            "  [{:>3}] {} ({}, {} queue{})",
            record.handle.index(),
            record.label,
            record.kind,
            info.queue,
            info.merge_group
                .map(|group| format!(", merge group {group}"))
                .unwrap_or_default()
        );
        if let Some(producer) = info.sync_to {
            log::debug!("        wait: {}", passes[producer.slot()].label);
        }
        if !info.creates.is_empty() {
            log::debug!("        create: {}", names(&info.creates));
        }
        if !info.releases.is_empty() {
            log::debug!("        release: {}", names(&info.releases));
        }
        if info.needs_fence {
            log::debug!("        signal fence");
        }
    }
    if !compiled.end_of_frame_releases.is_empty() {
        log::debug!(
            "  end of frame release: {}",
            names(&compiled.end_of_frame_releases)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ColorAccess, FrameGraph};
    use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

    fn color() -> TextureDescriptor {
        TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT,
        )
    }

    #[test]
    fn test_empty_graph_compiles() {
        let mut graph = FrameGraph::new();
        let compiled = graph.compile().unwrap();
        assert!(compiled.is_empty());
        assert_eq!(compiled.culled_count(), 0);
    }

    #[test]
    fn test_attachment_gap_is_rejected() {
        let mut graph = FrameGraph::new();
        let target = graph.create_texture(color());
        {
            let mut pass = graph.add_raster_pass::<()>("gap");
            pass.set_color_attachment(target, 1, ColorAccess::WriteAll)
                .unwrap();
            pass.enable_pass_culling(false);
            pass.set_execute_func(|_, _| Ok(()));
        }
        assert!(matches!(
            graph.compile(),
            Err(GraphError::MissingAttachmentSlot { slot: 0, .. })
        ));
    }

    #[test]
    fn test_missing_callback_is_rejected_only_when_alive() {
        let mut graph = FrameGraph::new();
        let unused = graph.create_texture(color());
        graph.add_compute_pass::<()>("dead").write_texture(unused);
        assert!(graph.compile().is_ok());

        graph
            .add_compute_pass::<()>("pinned")
            .enable_pass_culling(false);
        assert!(matches!(
            graph.compile(),
            Err(GraphError::MissingExecuteCallback { pass }) if pass == "pinned"
        ));
    }

    #[test]
    fn test_compile_is_repeatable() {
        let mut graph = FrameGraph::new();
        let target = graph.create_texture(color());
        {
            let mut pass = graph.add_raster_pass::<()>("draw");
            pass.set_color_attachment(target, 0, ColorAccess::WriteAll)
                .unwrap();
            pass.enable_pass_culling(false);
            pass.set_execute_func(|_, _| Ok(()));
        }
        let first = graph.compile().unwrap().execution_order().to_vec();
        let second = graph.compile().unwrap().execution_order().to_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_pass_compile_info_reset() {
        let mut info = PassCompileInfo {
            ref_count: 3,
            culled: true,
            needs_fence: true,
            creates: vec![],
            merge_group: Some(1),
            ..PassCompileInfo::default()
        };
        info.creates.reserve(4);
        info.reset();
        assert_eq!(info.ref_count, 0);
        assert!(!info.culled && !info.needs_fence);
        assert_eq!(info.merge_group, None);
        assert!(info.creates.capacity() >= 4);
    }
}
