//! Reference counting and dead pass elimination.
//!
//! A pass counts its outputs; a resource counts its readers. A resource no
//! one reads releases one reference on each of its producers, and a producer
//! left without references is culled, which in turn releases the resources it
//! reads. This runs as a single worklist over resources until it settles.

use crate::backend::QueueType;
use crate::config::FrameGraphConfig;
use crate::graph::{PassRecord, ResourceHandle, ResourceOrigin, ResourceRegistry};

use super::{CompiledGraph, PassCompileInfo};

/// Fill reference counts, producer/consumer lists, side effects and queues.
pub(super) fn count_references(
    passes: &[PassRecord],
    registry: &ResourceRegistry,
    config: &FrameGraphConfig,
    compiled: &mut CompiledGraph,
) {
    for handle in registry.handles() {
        let info = &mut compiled.resources[handle.slot()];
        info.imported = registry.is_imported(handle);
        info.temporary = matches!(registry.origin(handle), Some(ResourceOrigin::Temporary(_)));
    }

    for record in passes {
        let pass = record.handle;
        let info = &mut compiled.passes[pass.slot()];
        info.queue = if config.enable_async_compute && record.async_compute {
            QueueType::AsyncCompute
        } else {
            QueueType::Graphics
        };

        for read in &record.reads {
            let resource = &mut compiled.resources[read.slot()];
            if is_external_read(record, *read) {
                resource.ref_count += 1;
            }
            resource.consumers.push(pass);
        }
        for write in &record.writes {
            let resource = &mut compiled.resources[write.slot()];
            resource.producers.push(pass);
            info.ref_count += 1;
            if resource.imported {
                info.has_side_effect = true;
            }
        }
        // A temporary has no reader outside its pass, so it adds an output
        // that the sweep immediately takes back.
        for temporary in &record.temporaries {
            let resource = &mut compiled.resources[temporary.slot()];
            resource.producers.push(pass);
            resource.consumers.push(pass);
            info.ref_count += 1;
        }
    }
}

/// Mark every pass that contributes nothing observable as culled.
pub(super) fn cull_passes(passes: &[PassRecord], compiled: &mut CompiledGraph) {
    // Passes without any output.
    for record in passes {
        let info = &compiled.passes[record.handle.slot()];
        if info.ref_count == 0 && is_cullable(record, info) {
            compiled.passes[record.handle.slot()].culled = true;
            for read in record.reads.iter().filter(|read| is_external_read(record, **read)) {
                let resource = &mut compiled.resources[read.slot()];
                resource.ref_count = resource.ref_count.saturating_sub(1);
            }
        }
    }

    let mut unused: Vec<usize> = compiled
        .resources
        .iter()
        .enumerate()
        .filter(|(_, resource)| resource.ref_count == 0)
        .map(|(index, _)| index)
        .collect();

    while let Some(resource) = unused.pop() {
        for i in 0..compiled.resources[resource].producers.len() {
            let producer = compiled.resources[resource].producers[i];
            let record = &passes[producer.slot()];
            let info = &mut compiled.passes[producer.slot()];
            if info.culled || info.ref_count == 0 {
                continue;
            }

            info.ref_count -= 1;
            if info.ref_count > 0 || !is_cullable(record, info) {
                continue;
            }

            info.culled = true;
            log::trace!("Culling pass '{}'", record.label);
            for read in record.reads.iter().filter(|read| is_external_read(record, **read)) {
                let consumer = &mut compiled.resources[read.slot()];
                if consumer.ref_count > 0 {
                    consumer.ref_count -= 1;
                    if consumer.ref_count == 0 {
                        unused.push(read.slot());
                    }
                }
            }
        }
    }
}

fn is_cullable(record: &PassRecord, info: &PassCompileInfo) -> bool {
    record.allow_culling && !info.has_side_effect
}

// A read of the pass's own output (an in-place update) keeps nothing alive.
fn is_external_read(record: &PassRecord, read: ResourceHandle) -> bool {
    !record.writes.contains(&read)
}

#[cfg(test)]
mod tests {
    use crate::backend::GpuTexture;
    use crate::graph::{FrameGraph, TextureHandle};
    use crate::types::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TextureUsage};

    fn desc() -> TextureDescriptor {
        TextureDescriptor::new_2d(
            16,
            16,
            TextureFormat::Rgba16Float,
            TextureUsage::STORAGE | TextureUsage::SAMPLED,
        )
    }

    fn compute(graph: &mut FrameGraph, label: &str, reads: &[TextureHandle], writes: &[TextureHandle]) {
        let mut pass = graph.add_compute_pass::<()>(label);
        for read in reads {
            pass.read_texture(*read);
        }
        for write in writes {
            pass.write_texture(*write);
        }
        pass.set_execute_func(|_, _| Ok(()));
    }

    #[test]
    fn test_unread_chain_is_culled_transitively() {
        let mut graph = FrameGraph::new();
        let a = graph.create_texture(desc());
        let b = graph.create_texture(desc());
        let c = graph.create_texture(desc());
        compute(&mut graph, "p0", &[], &[a]);
        compute(&mut graph, "p1", &[a], &[b]);
        compute(&mut graph, "p2", &[b], &[c]);

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.culled_count(), 3);
        assert_eq!(compiled.resource(a).unwrap().ref_count(), 0);
        assert_eq!(compiled.resource(b).unwrap().ref_count(), 0);
    }

    #[test]
    fn test_side_effect_keeps_its_inputs_alive() {
        let mut graph = FrameGraph::new();
        let a = graph.create_texture(desc());
        let dead = graph.create_texture(desc());
        let backbuffer = graph.import_texture(GpuTexture(1), desc());
        compute(&mut graph, "p0", &[], &[a]);
        compute(&mut graph, "unused", &[a], &[dead]);
        compute(&mut graph, "present", &[a], &[backbuffer]);

        let compiled = graph.compile().unwrap();
        let order: Vec<u32> = compiled.execution_order().iter().map(|p| p.index()).collect();
        assert_eq!(order, vec![0, 2]);
        assert!(compiled.passes()[2].has_side_effect());
        assert_eq!(compiled.resource(a).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_pass_without_outputs_is_culled() {
        let mut graph = FrameGraph::new();
        let a = graph.import_texture(GpuTexture(3), desc());
        compute(&mut graph, "reader", &[a], &[]);
        assert_eq!(graph.compile().unwrap().culled_count(), 1);
    }

    #[test]
    fn test_culling_disabled_keeps_everything() {
        let mut graph = FrameGraph::with_config(crate::FrameGraphConfig::new().with_culling(false));
        let a = graph.create_texture(desc());
        compute(&mut graph, "p0", &[], &[a]);
        assert_eq!(graph.compile().unwrap().culled_count(), 0);
    }

    #[test]
    fn test_temporary_does_not_pin_its_pass() {
        let mut graph = FrameGraph::new();
        {
            let mut pass = graph.add_compute_pass::<()>("scratch_only");
            pass.create_temporary_buffer(BufferDescriptor::new(256, BufferUsage::STORAGE));
            pass.set_execute_func(|_, _| Ok(()));
        }
        assert_eq!(graph.compile().unwrap().culled_count(), 1);
    }

    #[test]
    fn test_unread_in_place_update_is_culled() {
        let mut graph = FrameGraph::new();
        let a = graph.create_texture(desc());
        compute(&mut graph, "p0", &[], &[a]);
        compute(&mut graph, "in_place", &[a], &[a]);
        assert_eq!(graph.compile().unwrap().culled_count(), 2);
    }

    #[test]
    fn test_partially_used_outputs_keep_pass() {
        let mut graph = FrameGraph::new();
        let used = graph.create_texture(desc());
        let unused = graph.create_texture(desc());
        let out = graph.import_texture(GpuTexture(8), desc());
        compute(&mut graph, "two_outputs", &[], &[used, unused]);
        compute(&mut graph, "present", &[used], &[out]);

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.culled_count(), 0);
        assert_eq!(compiled.passes()[0].ref_count(), 1);
    }
}
