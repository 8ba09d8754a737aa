//! Configuration system for Voyager.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/voyager/config.toml` and/or `.voyager/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for the Voyager orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub planner: PlannerConfig,
    pub verifier: VerifierConfig,
    pub orchestrator: OrchestratorConfig,
    pub inventory: InventoryConfig,
    pub location: LocationConfig,
    pub logging: LoggingConfig,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: "openai", "anthropic", "mock".
    pub provider: String,
    /// Model identifier (e.g., "gpt-4o", "claude-sonnet-4-20250514").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Context window size for the model.
    pub context_window: usize,
    /// Retry configuration for transient API errors (429, 5xx, timeouts).
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 4096,
            temperature: 0.2,
            context_window: 128_000,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid; does not error on
    /// problematic values, only surfaces them for the caller to log.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_tokens >= self.context_window {
            warnings.push(format!(
                "max_tokens ({}) >= context_window ({}); responses may be truncated or fail",
                self.max_tokens, self.context_window
            ));
        }
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0-2.0",
                self.temperature
            ));
        }
        warnings
    }
}

/// Retry configuration for transient provider/inventory errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 20_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Planner-specific configuration: turn caps and the per-turn deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum tool-calling turns before the planner gives up and falls
    /// back to a `Clarification` carrying the last raw assistant text.
    pub max_turns: usize,
    /// Overall wall-clock deadline for a single planning attempt, in seconds.
    pub deadline_secs: u64,
    /// Maximum number of itinerary candidates the planner should propose.
    pub max_candidates: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_turns: 15,
            deadline_secs: 220,
            max_candidates: 3,
        }
    }
}

/// Per-lookup timeout for the Planner's post-processing location-code
/// resolution pass (spec §4.3 "Post-processing: code resolution").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub lookup_timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { lookup_timeout_secs: 10 }
    }
}

/// Verifier-specific configuration: concurrency and per-item timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Maximum number of nodes/edges verified concurrently.
    pub max_concurrency: usize,
    /// Per-item (node/edge) verification timeout, in seconds.
    pub item_timeout_secs: u64,
    /// Currency that all costs are normalized into during verification.
    pub settlement_currency: String,
    /// Flight options retained per edge.
    pub flight_limit: usize,
    /// Hotel ids searched per node.
    pub hotel_limit: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            item_timeout_secs: 10,
            settlement_currency: "USD".to_string(),
            flight_limit: 10,
            hotel_limit: 10,
        }
    }
}

/// Orchestrator-specific configuration: the Plan/Verify/Repair loop bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of Plan/Verify/Repair iterations.
    pub max_iterations: usize,
    /// Maximum candidate itineraries verified concurrently per iteration.
    pub max_concurrent_candidates: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_concurrent_candidates: 3,
        }
    }
}

/// Inventory provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Provider name: "mock", "live".
    pub provider: String,
    /// Base URL for a live inventory provider, if any.
    pub base_url: Option<String>,
    /// Request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            base_url: None,
            request_timeout_secs: 30,
        }
    }
}

/// Logging/observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter`-compatible directive string.
    pub filter: String,
    /// Emit logs as JSON instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration from defaults, user config, workspace config, environment
/// variables, and explicit overrides, in that order of increasing precedence.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&AppConfig>,
) -> Result<AppConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "voyager", "voyager") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".voyager").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (VOYAGER_LLM__MODEL, VOYAGER_PLANNER__MAX_TURNS, etc.)
    figment = figment.merge(Env::prefixed("VOYAGER_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether any Voyager configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "voyager", "voyager")
        && config_dir.config_dir().join("config.toml").exists()
    {
        return true;
    }
    if let Some(ws) = workspace {
        return ws.join(".voyager").join("config.toml").exists();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrips_through_figment() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.planner.max_turns, 15);
        assert_eq!(config.orchestrator.max_iterations, 5);
    }

    #[test]
    fn test_env_override() {
        // SAFETY: test runs single-threaded w.r.t. this env var.
        unsafe {
            std::env::set_var("VOYAGER_LLM__MODEL", "gpt-4o-mini");
        }
        let config = load_config(None, None).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        unsafe {
            std::env::remove_var("VOYAGER_LLM__MODEL");
        }
    }

    #[test]
    fn test_explicit_override_wins() {
        let mut overrides = AppConfig::default();
        overrides.orchestrator.max_iterations = 10;
        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.orchestrator.max_iterations, 10);
    }

    #[test]
    fn test_llm_config_validate_warns_on_bad_temperature() {
        let mut llm = LlmConfig::default();
        llm.temperature = 3.0;
        assert!(!llm.validate().is_empty());
    }
}
