//! LLM provider implementations.
//!
//! Provides a concrete `LlmProvider` implementation for OpenAI-compatible
//! chat-completion APIs (OpenAI, Azure, Ollama, vLLM, LM Studio) — any
//! backend meeting the outbound contract in spec §6. Use `create_provider`
//! to instantiate the configured provider.

pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;

pub use openai_compat::OpenAiCompatibleProvider;

/// Create an LLM provider based on configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    Ok(Arc::new(OpenAiCompatibleProvider::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmConfig {
        LlmConfig {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "VOYAGER_TEST_API_KEY".to_string(),
            base_url: None,
            max_tokens: 4096,
            temperature: 0.2,
            context_window: 128_000,
            retry: Default::default(),
        }
    }

    #[test]
    fn test_create_provider_reads_api_key_from_env() {
        unsafe {
            std::env::set_var("VOYAGER_TEST_API_KEY", "test-key-123");
        }
        let config = test_config();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o");
        unsafe {
            std::env::remove_var("VOYAGER_TEST_API_KEY");
        }
    }

    #[test]
    fn test_create_provider_missing_key_fails() {
        unsafe {
            std::env::remove_var("VOYAGER_NONEXISTENT_KEY");
        }
        let mut config = test_config();
        config.api_key_env = "VOYAGER_NONEXISTENT_KEY".to_string();
        let result = create_provider(&config);
        assert!(matches!(result, Err(LlmError::AuthFailed { .. })));
    }
}
