//! Attachment load/store inference.
//!
//! Load actions follow the access intent of the attachment and whether
//! earlier surviving passes left content behind. Store actions only keep data
//! that a later surviving pass (or the outside world, for imported resources)
//! can observe.

use crate::graph::{ColorAccess, DepthAccess, PassHandle, PassRecord, ResourceHandle, ResourceRegistry};
use crate::types::{AttachmentOps, ClearValue, LoadOp, StoreOp};

use super::{CompiledGraph, ResourceCompileInfo};

/// Fill color and depth attachment actions for every surviving raster pass.
pub(super) fn infer_attachment_ops(
    passes: &[PassRecord],
    registry: &ResourceRegistry,
    compiled: &mut CompiledGraph,
) {
    for record in passes.iter().filter(|record| record.is_raster()) {
        let pass = record.handle;
        if compiled.passes[pass.slot()].culled {
            continue;
        }

        for (slot, attachment) in record.color_attachments.iter().enumerate() {
            let Some(attachment) = attachment else {
                continue;
            };
            let texture = ResourceHandle::from(attachment.texture);
            let resource = &compiled.resources[texture.slot()];
            let load = match attachment.access {
                ColorAccess::WriteAll | ColorAccess::Discard => {
                    clear_or_dont_care(clear_value(registry, texture))
                }
                ColorAccess::Write if has_prior_content(resource, pass, compiled) => LoadOp::Load,
                ColorAccess::Write => LoadOp::DontCare,
                ColorAccess::Read => LoadOp::Load,
            };
            let ops = AttachmentOps::new(load, store_op(resource, pass, compiled));
            compiled.passes[pass.slot()].color_ops[slot] = Some(ops);
        }

        if let Some(attachment) = record.depth_attachment {
            let texture = ResourceHandle::from(attachment.texture);
            let resource = &compiled.resources[texture.slot()];
            let load = match attachment.access {
                DepthAccess::ReadOnly => LoadOp::Load,
                DepthAccess::ReadWrite if has_prior_content(resource, pass, compiled) => LoadOp::Load,
                DepthAccess::ReadWrite => clear_or_dont_care(clear_value(registry, texture)),
            };
            let ops = AttachmentOps::new(load, store_op(resource, pass, compiled));
            compiled.passes[pass.slot()].depth_ops = Some(ops);
        }
    }
}

fn clear_value(registry: &ResourceRegistry, texture: ResourceHandle) -> ClearValue {
    registry
        .descriptor(texture)
        .map(|descriptor| descriptor.clear_value())
        .unwrap_or_default()
}

fn clear_or_dont_care(clear: ClearValue) -> LoadOp {
    if clear.is_requested() {
        LoadOp::Clear(clear)
    } else {
        LoadOp::DontCare
    }
}

// Imported resources arrive with content written outside the frame.
fn has_prior_content(resource: &ResourceCompileInfo, pass: PassHandle, compiled: &CompiledGraph) -> bool {
    resource.imported
        || resource
            .latest_producer_before(pass, &compiled.passes)
            .is_some()
}

fn store_op(resource: &ResourceCompileInfo, pass: PassHandle, compiled: &CompiledGraph) -> StoreOp {
    if resource.imported || resource.has_later_user(pass, &compiled.passes) {
        StoreOp::Store
    } else {
        StoreOp::DontCare
    }
}
