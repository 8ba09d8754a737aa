//! Error types for the Voyager orchestration core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering LLM, planning, verification, and orchestration failures.

/// Top-level error type for the Voyager core library.
#[derive(Debug, thiserror::Error)]
pub enum VoyagerError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error, Clone)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors surfaced while driving the Planner's tool-calling loop.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("planner turn cap ({max_turns}) reached without a final proposal")]
    TurnCapReached { max_turns: usize },

    #[error("planner deadline of {timeout_secs}s expired")]
    DeadlineExpired { timeout_secs: u64 },

    #[error("planner was cancelled")]
    Cancelled,

    #[error("capability '{name}' failed: {message}")]
    CapabilityFailed { name: String, message: String },

    #[error("capability '{name}' not found in registry")]
    CapabilityNotFound { name: String },
}

/// Errors from the Verifier's interaction with the inventory provider.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("itinerary failed pre-verification validation: {0}")]
    ValidationFailed(String),

    #[error("inventory provider error: {0}")]
    Inventory(String),
}

/// Errors from the Plan/Verify/Repair control loop.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("empty query")]
    EmptyQuery,

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error("planner returned neither a proposal nor a clarification request")]
    NoProposal,

    #[error("orchestration was cancelled")]
    Cancelled,
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("configuration parse error: {0}")]
    ParseError(#[from] Box<figment::Error>),
}

/// A type alias for results using the top-level `VoyagerError`.
pub type Result<T> = std::result::Result<T, VoyagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = VoyagerError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_planner() {
        let err = VoyagerError::Planner(PlannerError::TurnCapReached { max_turns: 15 });
        assert_eq!(
            err.to_string(),
            "Planner error: planner turn cap (15) reached without a final proposal"
        );
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: VoyagerError = serde_err.into();
        assert!(matches!(err, VoyagerError::Serialization(_)));
    }

    #[test]
    fn test_orchestrator_error_from_planner() {
        let perr = PlannerError::Cancelled;
        let err: OrchestratorError = perr.into();
        assert!(matches!(err, OrchestratorError::Planner(_)));
    }
}
