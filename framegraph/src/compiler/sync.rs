//! Cross-queue synchronization.
//!
//! A pass that touches a resource last produced on the other queue must wait
//! for that producer's fence. Each queue direction keeps a cursor: the newest
//! producer already waited on. Queues execute in order, so waiting on a
//! producer also covers every earlier pass on its queue, and a producer at or
//! before the cursor needs no new fence.

use crate::backend::QueueType;
use crate::graph::{PassHandle, PassRecord};

use super::CompiledGraph;

/// Fill `sync_to`, `sync_from` and `needs_fence` for surviving passes.
pub(super) fn synchronize_queues(passes: &[PassRecord], compiled: &mut CompiledGraph) {
    let mut graphics_waited: Option<PassHandle> = None;
    let mut compute_waited: Option<PassHandle> = None;

    for record in passes {
        let pass = record.handle;
        let queue = compiled.passes[pass.slot()].queue;
        if compiled.passes[pass.slot()].culled {
            continue;
        }

        for resource in record.accessed() {
            let Some(producer) =
                compiled.resources[resource.slot()].latest_producer_before(pass, &compiled.passes)
            else {
                continue;
            };
            if compiled.passes[producer.slot()].queue == queue {
                continue;
            }

            let cursor = match queue {
                QueueType::Graphics => &mut graphics_waited,
                QueueType::AsyncCompute => &mut compute_waited,
            };
            if cursor.is_some_and(|waited| producer <= waited) {
                continue;
            }
            *cursor = Some(producer);

            let info = &mut compiled.passes[pass.slot()];
            info.sync_to = info.sync_to.max(Some(producer));

            let producer_info = &mut compiled.passes[producer.slot()];
            producer_info.needs_fence = true;
            if producer_info.sync_from.is_none() {
                producer_info.sync_from = Some(pass);
            }

            log::trace!(
                "Pass '{}' ({}) waits on '{}'",
                record.label,
                queue,
                passes[producer.slot()].label
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::FrameGraphConfig;
    use crate::backend::{GpuTexture, QueueType};
    use crate::graph::{BufferHandle, FrameGraph, PassHandle};
    use crate::types::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TextureUsage};

    fn buffer(graph: &mut FrameGraph) -> BufferHandle {
        graph.create_buffer(BufferDescriptor::new(1024, BufferUsage::STORAGE))
    }

    fn pass(
        graph: &mut FrameGraph,
        label: &str,
        async_compute: bool,
        reads: &[BufferHandle],
        writes: &[BufferHandle],
    ) -> PassHandle {
        let mut pass = graph.add_compute_pass::<()>(label);
        for read in reads {
            pass.read_buffer(*read);
        }
        for write in writes {
            pass.write_buffer(*write);
        }
        pass.enable_async_compute(async_compute);
        pass.set_execute_func(|_, _| Ok(()));
        pass.handle()
    }

    fn sink(graph: &mut FrameGraph, reads: &[BufferHandle]) -> PassHandle {
        let output = graph.import_texture(
            GpuTexture(77),
            TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba8Unorm, TextureUsage::STORAGE),
        );
        let mut pass = graph.add_compute_pass::<()>("sink");
        for read in reads {
            pass.read_buffer(*read);
        }
        pass.write_texture(output);
        pass.set_execute_func(|_, _| Ok(()));
        pass.handle()
    }

    #[test]
    fn test_graphics_waits_on_async_producer() {
        let mut graph = FrameGraph::new();
        let particles = buffer(&mut graph);
        let producer = pass(&mut graph, "simulate", true, &[], &[particles]);
        let consumer = sink(&mut graph, &[particles]);

        let compiled = graph.compile().unwrap();
        let producer_info = compiled.pass(producer).unwrap();
        assert_eq!(producer_info.queue(), QueueType::AsyncCompute);
        assert!(producer_info.needs_fence());
        assert_eq!(producer_info.sync_from(), Some(consumer));
        assert_eq!(compiled.pass(consumer).unwrap().sync_to(), Some(producer));
    }

    #[test]
    fn test_async_waits_on_graphics_producer() {
        let mut graph = FrameGraph::new();
        let input = buffer(&mut graph);
        let output = buffer(&mut graph);
        let upload = pass(&mut graph, "upload", false, &[], &[input]);
        let cull = pass(&mut graph, "gpu_cull", true, &[input], &[output]);
        sink(&mut graph, &[output]);

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.pass(cull).unwrap().sync_to(), Some(upload));
        assert_eq!(compiled.pass(upload).unwrap().sync_from(), Some(cull));
        assert_eq!(compiled.fence_count(), 2);
    }

    #[test]
    fn test_cursor_avoids_redundant_fences() {
        let mut graph = FrameGraph::new();
        let a = buffer(&mut graph);
        let b = buffer(&mut graph);
        let first = pass(&mut graph, "async_a", true, &[], &[a]);
        let second = pass(&mut graph, "async_b", true, &[], &[b]);
        let reader_b = sink(&mut graph, &[b]);
        // Waiting on `async_b` already covers `async_a`.
        let reader_a = sink(&mut graph, &[a]);

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.pass(reader_b).unwrap().sync_to(), Some(second));
        assert_eq!(compiled.pass(reader_a).unwrap().sync_to(), None);
        assert!(!compiled.pass(first).unwrap().needs_fence());
        assert_eq!(compiled.fence_count(), 1);
    }

    #[test]
    fn test_same_queue_needs_no_fence() {
        let mut graph = FrameGraph::new();
        let a = buffer(&mut graph);
        pass(&mut graph, "producer", false, &[], &[a]);
        sink(&mut graph, &[a]);
        assert_eq!(graph.compile().unwrap().fence_count(), 0);
    }

    #[test]
    fn test_async_disabled_by_config() {
        let mut graph = FrameGraph::with_config(FrameGraphConfig::new().with_async_compute(false));
        let a = buffer(&mut graph);
        let producer = pass(&mut graph, "simulate", true, &[], &[a]);
        sink(&mut graph, &[a]);

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.pass(producer).unwrap().queue(), QueueType::Graphics);
        assert_eq!(compiled.fence_count(), 0);
    }
}
