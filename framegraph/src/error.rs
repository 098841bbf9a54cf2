//! Frame graph error types.

use thiserror::Error;

use crate::backend::BackendError;
use crate::graph::{PassKind, ResourceHandle};

/// Errors raised while declaring, compiling or executing a frame.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A handle from an earlier frame was used.
    #[error("{handle} belongs to frame generation {generation}, current generation is {current}")]
    StaleHandle {
        handle: ResourceHandle,
        generation: u32,
        current: u32,
    },

    /// A handle that does not name a registered resource of its kind.
    #[error("{0} does not name a registered resource")]
    InvalidHandle(ResourceHandle),

    /// Color attachment slot index is not below the slot limit.
    #[error("pass '{pass}': color attachment slot {slot} is out of range")]
    AttachmentSlotOutOfRange { pass: String, slot: usize },

    /// A different attachment is already bound to the slot.
    #[error("pass '{pass}': color attachment slot {slot} is already bound")]
    AttachmentSlotConflict { pass: String, slot: usize },

    /// A different depth/stencil attachment is already bound.
    #[error("pass '{pass}': depth/stencil attachment is already bound")]
    DepthAttachmentConflict { pass: String },

    /// Attachments were bound on a pass that does not rasterize.
    #[error("pass '{pass}': attachments cannot be bound on a {kind} pass")]
    AttachmentOnNonRasterPass { pass: String, kind: PassKind },

    /// Color attachment slots must be dense from slot 0.
    #[error("pass '{pass}': color attachment slot {slot} is empty but a higher slot is bound")]
    MissingAttachmentSlot { pass: String, slot: usize },

    /// A pass that survived culling has no execute callback.
    #[error("pass '{pass}' has no execute callback")]
    MissingExecuteCallback { pass: String },

    /// Async compute work on a resource is never waited on by the graphics queue.
    #[error(
        "async compute pass '{pass}' uses {resource} but no graphics pass synchronizes with it"
    )]
    UnsynchronizedAsyncProducer {
        pass: String,
        resource: ResourceHandle,
    },

    /// A pass waits on a fence that was never created.
    #[error("pass '{pass}' waits on a fence from '{producer}' that was never created")]
    MissingFence { pass: String, producer: String },

    /// A resource had no physical binding when a pass needed it.
    #[error("{0} is not bound to a GPU resource")]
    UnboundResource(ResourceHandle),

    /// A pass callback failed; the rest of the frame was skipped.
    #[error("pass '{pass}' failed: {source}")]
    PassFailed {
        pass: String,
        #[source]
        source: PassError,
    },

    /// The resource pool or command encoder failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Error returned by a pass execute callback.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct PassError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl PassError {
    /// Create an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<BackendError> for PassError {
    fn from(error: BackendError) -> Self {
        Self::with_source("backend error", error)
    }
}

impl From<GraphError> for PassError {
    fn from(error: GraphError) -> Self {
        Self::with_source("graph error", error)
    }
}
