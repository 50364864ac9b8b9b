//! Error types for the VM backend.

use resource_framework::ModelError;
use thiserror::Error;

/// Errors that can occur during VM operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VmError {
    /// The VM is already running.
    #[error("vm '{0}' is already running")]
    AlreadyRunning(String),

    /// The VM is shut off.
    #[error("vm '{0}' is not running")]
    NotRunning(String),

    /// The operation needs the VM to be shut off first.
    #[error("vm '{0}' must be shut off before it can be {1}")]
    MustBeShutoff(String, &'static str),
}

impl From<VmError> for ModelError {
    fn from(e: VmError) -> Self {
        ModelError::InvalidOperation(e.to_string())
    }
}
