//! Raster pass merging.
//!
//! Runs of adjacent raster passes that bind the same attachments become the
//! subpasses of one native render pass, letting tile-based GPUs keep the
//! attachments on chip. Runs break at the first pass that is culled, is not a
//! raster pass, opts out of merging, or binds different attachments.

use crate::graph::{PassHandle, PassRecord};

use super::CompiledGraph;

/// Fill `merge_groups` and each member's `merge_group`.
pub(super) fn find_merge_groups(passes: &[PassRecord], compiled: &mut CompiledGraph) {
    let mut run: Vec<PassHandle> = Vec::new();

    for record in passes {
        let eligible =
            record.is_raster() && record.allow_merge && !compiled.passes[record.handle.slot()].culled;
        if !eligible {
            close_run(&mut run, compiled);
            continue;
        }

        if let Some(last) = run.last().copied()
            && !same_attachments(&passes[last.slot()], record)
        {
            close_run(&mut run, compiled);
        }
        run.push(record.handle);
    }
    close_run(&mut run, compiled);
}

fn close_run(run: &mut Vec<PassHandle>, compiled: &mut CompiledGraph) {
    if run.len() >= 2 {
        let group = compiled.merge_groups.len();
        compiled.merge_groups.push_empty().passes.extend_from_slice(run);
        for pass in run.iter() {
            compiled.passes[pass.slot()].merge_group = Some(group);
        }
        log::trace!("Merged {} raster passes into group {}", run.len(), group);
    }
    run.clear();
}

// Color access may differ (e.g. write then input-attachment read); the bound
// textures and the depth binding may not.
fn same_attachments(a: &PassRecord, b: &PassRecord) -> bool {
    let colors_match = a
        .color_attachments
        .iter()
        .zip(&b.color_attachments)
        .all(|(x, y)| x.map(|x| x.texture) == y.map(|y| y.texture));
    colors_match && a.depth_attachment == b.depth_attachment
}

#[cfg(test)]
mod tests {
    use crate::graph::{ColorAccess, DepthAccess, FrameGraph, TextureHandle};
    use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

    fn target(graph: &mut FrameGraph, format: TextureFormat) -> TextureHandle {
        graph.create_texture(TextureDescriptor::new_2d(
            128,
            128,
            format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::INPUT_ATTACHMENT,
        ))
    }

    fn raster(
        graph: &mut FrameGraph,
        label: &str,
        color: TextureHandle,
        access: ColorAccess,
        depth: Option<(TextureHandle, DepthAccess)>,
    ) {
        let mut pass = graph.add_raster_pass::<()>(label);
        pass.set_color_attachment(color, 0, access).unwrap();
        if let Some((texture, access)) = depth {
            pass.set_depth_stencil_attachment(texture, access).unwrap();
        }
        pass.enable_pass_culling(false);
        pass.set_execute_func(|_, _| Ok(()));
    }

    #[test]
    fn test_identical_attachments_merge() {
        let mut graph = FrameGraph::new();
        let color = target(&mut graph, TextureFormat::Rgba8Unorm);
        raster(&mut graph, "a", color, ColorAccess::WriteAll, None);
        raster(&mut graph, "b", color, ColorAccess::Read, None);
        raster(&mut graph, "c", color, ColorAccess::Write, None);

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.merge_groups().len(), 1);
        assert_eq!(compiled.merge_groups()[0].passes().len(), 3);
        assert!(compiled.passes().iter().all(|p| p.merge_group() == Some(0)));
    }

    #[test]
    fn test_depth_access_mismatch_breaks_run() {
        let mut graph = FrameGraph::new();
        let color = target(&mut graph, TextureFormat::Rgba8Unorm);
        let depth = target(&mut graph, TextureFormat::Depth32Float);
        raster(&mut graph, "a", color, ColorAccess::WriteAll, Some((depth, DepthAccess::ReadWrite)));
        raster(&mut graph, "b", color, ColorAccess::Write, Some((depth, DepthAccess::ReadOnly)));

        assert!(graph.compile().unwrap().merge_groups().is_empty());
    }

    #[test]
    fn test_non_raster_pass_breaks_run() {
        let mut graph = FrameGraph::new();
        let color = target(&mut graph, TextureFormat::Rgba8Unorm);
        raster(&mut graph, "a", color, ColorAccess::WriteAll, None);
        graph
            .add_compute_pass::<()>("between")
            .enable_pass_culling(false)
            .set_execute_func(|_, _| Ok(()));
        raster(&mut graph, "b", color, ColorAccess::Write, None);
        raster(&mut graph, "c", color, ColorAccess::Write, None);

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.merge_groups().len(), 1);
        let members: Vec<u32> = compiled.merge_groups()[0]
            .passes()
            .iter()
            .map(|p| p.index())
            .collect();
        assert_eq!(members, vec![2, 3]);
        assert_eq!(compiled.passes()[0].merge_group(), None);
    }

    #[test]
    fn test_opt_out_and_config() {
        let mut graph = FrameGraph::new();
        let color = target(&mut graph, TextureFormat::Rgba8Unorm);
        raster(&mut graph, "a", color, ColorAccess::WriteAll, None);
        {
            let mut pass = graph.add_raster_pass::<()>("b");
            pass.set_color_attachment(color, 0, ColorAccess::Write).unwrap();
            pass.allow_pass_merge(false);
            pass.enable_pass_culling(false);
            pass.set_execute_func(|_, _| Ok(()));
        }
        assert!(graph.compile().unwrap().merge_groups().is_empty());

        graph.reset();
        graph.set_config(crate::FrameGraphConfig::new().with_pass_merging(false));
        let color = target(&mut graph, TextureFormat::Rgba8Unorm);
        raster(&mut graph, "a", color, ColorAccess::WriteAll, None);
        raster(&mut graph, "b", color, ColorAccess::Write, None);
        assert!(graph.compile().unwrap().merge_groups().is_empty());
    }
}
