//! Backend error types.

use thiserror::Error;

/// Errors reported by a [`ResourcePool`](super::ResourcePool) or
/// [`CommandEncoder`](super::CommandEncoder).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// A command was issued in a state that does not allow it.
    #[error("invalid encoder state: {0}")]
    InvalidState(String),
    /// A queue submission failed.
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(BackendError::OutOfMemory.to_string(), "out of GPU memory");
        assert_eq!(
            BackendError::InvalidState("render pass already open".into()).to_string(),
            "invalid encoder state: render pass already open"
        );
    }
}
