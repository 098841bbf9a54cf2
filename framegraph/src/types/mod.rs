//! Descriptors and plain data types used throughout the frame graph.
//!
//! This module contains format enums, usage flags, resource descriptors and
//! the attachment load/store actions the compiler infers.

mod buffer;
mod common;
mod texture;

pub use buffer::{BufferDescriptor, BufferKey, BufferUsage};
pub use common::{AttachmentOps, ClearValue, Extent3d, LoadOp, StoreOp};
pub use texture::{TextureDescriptor, TextureFormat, TextureKey, TextureUsage};
