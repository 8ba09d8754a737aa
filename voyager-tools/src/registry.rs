//! Capability Registry — holds the read-only capabilities available to the
//! Planner (`date`, `location`, `currency`) and executes them by name with a
//! timeout. The registry is append-only within a process (spec §4.2).

use crate::error::CapabilityError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use voyager_core::types::{ToolDefinition, ToolOutput};

/// Trait that every Planner-facing capability must implement.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique name of this capability, as seen by the Planner.
    fn name(&self) -> &str;

    /// Natural-language description shown to the Planner.
    fn description(&self) -> &str;

    /// JSON Schema for the capability's input arguments.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the capability with the given arguments. Side-effect-free.
    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, CapabilityError>;

    /// Maximum execution time before timeout.
    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }
}

/// Holds all registered capabilities and dispatches execution by name.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability. Errors if a capability with the same name already exists.
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> Result<(), CapabilityError> {
        let name = capability.name().to_string();
        if self.capabilities.contains_key(&name) {
            return Err(CapabilityError::AlreadyRegistered { name });
        }
        debug!(capability = %name, "Registering capability");
        self.capabilities.insert(name, capability);
        Ok(())
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    /// List all registered capability definitions, for the Planner's tool list.
    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        self.capabilities
            .values()
            .map(|cap| ToolDefinition {
                name: cap.name().to_string(),
                description: cap.description().to_string(),
                parameters: cap.parameters_schema(),
            })
            .collect()
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Execute a capability by name, applying its declared timeout.
    pub async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<ToolOutput, CapabilityError> {
        let capability = self
            .capabilities
            .get(name)
            .ok_or_else(|| CapabilityError::NotFound {
                name: name.to_string(),
            })?;

        let timeout = capability.timeout();
        info!(capability = %name, timeout_secs = timeout.as_secs(), "Executing capability");

        match tokio::time::timeout(timeout, capability.execute(args)).await {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout {
                name: name.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoCapability;

    #[async_trait]
    impl Capability for EchoCapability {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the input text back"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to echo" }
                },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, CapabilityError> {
            let text = args["text"]
                .as_str()
                .ok_or_else(|| CapabilityError::InvalidArguments {
                    name: "echo".to_string(),
                    reason: "missing 'text' parameter".to_string(),
                })?;
            Ok(ToolOutput::text(format!("Echo: {}", text)))
        }
    }

    struct SlowCapability;

    #[async_trait]
    impl Capability for SlowCapability {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "A capability that takes forever"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }

        async fn execute(&self, _args: serde_json::Value) -> Result<ToolOutput, CapabilityError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolOutput::text("done"))
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(100)
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = CapabilityRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_capability() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability)).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert!(registry.get("echo").is_some());
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability)).unwrap();

        let result = registry.register(Arc::new(EchoCapability));
        assert!(result.is_err());
        match result.unwrap_err() {
            CapabilityError::AlreadyRegistered { name } => assert_eq!(name, "echo"),
            other => panic!("Expected AlreadyRegistered, got {:?}", other),
        }
    }

    #[test]
    fn test_list_definitions() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability)).unwrap();

        let defs = registry.list_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn test_execute_capability() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability)).unwrap();

        let result = registry
            .execute("echo", serde_json::json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(result.content, "Echo: hello");
    }

    #[tokio::test]
    async fn test_execute_nonexistent() {
        let registry = CapabilityRegistry::new();
        let result = registry.execute("missing", serde_json::json!({})).await;
        assert!(result.is_err());
        match result.unwrap_err() {
            CapabilityError::NotFound { name } => assert_eq!(name, "missing"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(SlowCapability)).unwrap();

        let result = registry.execute("slow", serde_json::json!({})).await;
        assert!(result.is_err());
        match result.unwrap_err() {
            CapabilityError::Timeout { name, .. } => assert_eq!(name, "slow"),
            e => panic!("Expected Timeout, got: {:?}", e),
        }
    }
}
