//! Create/release scheduling for transient resources.
//!
//! A transient resource is taken from the pool right before its first
//! surviving user and returned right after its last one. Work on the async
//! compute queue can still be running when a later graphics pass executes, so
//! a resource touched by async work is only released once the graphics queue
//! has waited on that work: after the waiting pass, or at the end of the frame
//! behind an explicit fence wait.

use crate::backend::QueueType;
use crate::error::GraphError;
use crate::graph::{PassHandle, PassRecord, ResourceRegistry};

use super::{CompiledGraph, ReleasePoint, ResourceCompileInfo};

/// Fill create/release lists and end-of-frame releases.
pub(super) fn schedule_lifetimes(
    passes: &[PassRecord],
    registry: &ResourceRegistry,
    compiled: &mut CompiledGraph,
) -> Result<(), GraphError> {
    for handle in registry.handles() {
        let resource = &compiled.resources[handle.slot()];
        if resource.imported {
            continue;
        }

        let users = resource.live_users(&compiled.passes);
        let Some(first) = users.clone().min() else {
            continue;
        };

        let mut release_after: Option<PassHandle> = None;
        let mut unsynchronized: Option<PassHandle> = None;
        for user in users {
            if compiled.passes[user.slot()].queue == QueueType::Graphics {
                release_after = release_after.max(Some(user));
            } else {
                match graphics_waiter(user, compiled) {
                    Some(waiter) => release_after = release_after.max(Some(waiter)),
                    None => unsynchronized = unsynchronized.max(Some(user)),
                }
            }
        }

        if let Some(producer) = unsynchronized_producer(resource, compiled) {
            return Err(GraphError::UnsynchronizedAsyncProducer {
                pass: passes[producer.slot()].label.clone(),
                resource: handle,
            });
        }

        let release = match (unsynchronized, release_after) {
            (Some(user), _) => ReleasePoint::EndOfFrame { wait_on: user },
            (None, Some(pass)) => ReleasePoint::AfterPass(pass),
            (None, None) => continue,
        };

        compiled.passes[first.slot()].creates.push(handle);
        match release {
            ReleasePoint::AfterPass(pass) => compiled.passes[pass.slot()].releases.push(handle),
            ReleasePoint::EndOfFrame { wait_on } => {
                compiled.passes[wait_on.slot()].needs_fence = true;
                compiled.end_of_frame_releases.push(handle);
            }
        }

        let resource = &mut compiled.resources[handle.slot()];
        resource.created_at = Some(first);
        resource.release = Some(release);
    }
    Ok(())
}

/// Async producer of `resource` whose output is read later in the frame
/// while no graphics pass ever waits on it.
///
/// Async readers of graphics data and unread async writes are not errors:
/// those resources are released at the end of the frame instead.
fn unsynchronized_producer(
    resource: &ResourceCompileInfo,
    compiled: &CompiledGraph,
) -> Option<PassHandle> {
    resource.producers.iter().copied().find(|&producer| {
        let info = &compiled.passes[producer.slot()];
        !info.culled
            && info.queue == QueueType::AsyncCompute
            && graphics_waiter(producer, compiled).is_none()
            && resource
                .consumers
                .iter()
                .any(|&consumer| consumer > producer && !compiled.passes[consumer.slot()].culled)
    })
}

/// First graphics pass guaranteed to run after async pass `pass` completes.
///
/// Either the pass's own waiter or the waiter of a later async pass, since the
/// async queue completes in submission order.
fn graphics_waiter(pass: PassHandle, compiled: &CompiledGraph) -> Option<PassHandle> {
    compiled.passes.as_slice()[pass.slot()..]
        .iter()
        .filter(|info| !info.culled && info.queue == QueueType::AsyncCompute)
        .find_map(|info| info.sync_from)
}
