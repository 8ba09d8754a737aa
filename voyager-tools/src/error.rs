//! Errors produced by the capability registry and its registered capabilities.

/// Errors from registering, looking up, or executing a capability.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability not found: {name}")]
    NotFound { name: String },

    #[error("capability already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("invalid arguments for capability '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("capability '{name}' execution failed: {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("capability '{name}' timed out after {timeout_secs}s")]
    Timeout { name: String, timeout_secs: u64 },
}
