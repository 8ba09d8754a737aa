//! The `currency` capability: maps an ISO-3166 country code to its
//! ISO-4217 currency code (spec §4.2). Also used directly by the Verifier's
//! currency-normalization fallback (spec §4.4), via `lookup_fn`.

use crate::error::CapabilityError;
use async_trait::async_trait;
use serde_json::{Value, json};
use voyager_core::types::ToolOutput;

use crate::registry::Capability;

const COUNTRY_CURRENCY: &[(&str, &str)] = &[
    ("US", "USD"),
    ("GB", "GBP"),
    ("FR", "EUR"),
    ("DE", "EUR"),
    ("IT", "EUR"),
    ("ES", "EUR"),
    ("JP", "JPY"),
    ("AU", "AUD"),
    ("SG", "SGD"),
    ("AE", "AED"),
    ("CA", "CAD"),
    ("CH", "CHF"),
    ("CN", "CNY"),
    ("IN", "INR"),
];

/// Look up the ISO-4217 currency for an ISO-3166 country code.
pub fn lookup_currency(country_code: &str) -> Option<String> {
    let needle = country_code.trim().to_uppercase();
    COUNTRY_CURRENCY
        .iter()
        .find(|(code, _)| *code == needle)
        .map(|(_, currency)| currency.to_string())
}

/// A closure suitable for `voyager_core::verifier::Verifier::new`'s
/// `currency_lookup` parameter, backed by the same table this capability uses.
pub fn verifier_currency_lookup() -> std::sync::Arc<dyn Fn(&str) -> Option<String> + Send + Sync> {
    std::sync::Arc::new(lookup_currency)
}

/// The `currency` capability exposed to the Planner.
#[derive(Default)]
pub struct CurrencyCapability;

impl CurrencyCapability {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Capability for CurrencyCapability {
    fn name(&self) -> &str {
        "currency"
    }

    fn description(&self) -> &str {
        "Maps an ISO-3166 country code (e.g. 'FR') to its ISO-4217 currency \
         code (e.g. 'EUR')."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "country_code": {
                    "type": "string",
                    "description": "ISO-3166 alpha-2 country code"
                }
            },
            "required": ["country_code"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, CapabilityError> {
        let country_code =
            args["country_code"]
                .as_str()
                .ok_or_else(|| CapabilityError::InvalidArguments {
                    name: "currency".to_string(),
                    reason: "missing 'country_code' parameter".to_string(),
                })?;

        match lookup_currency(country_code) {
            Some(currency) => Ok(ToolOutput::json(&json!({ "currency": currency }))),
            None => Err(CapabilityError::ExecutionFailed {
                name: "currency".to_string(),
                message: format!("no known currency for country code '{}'", country_code),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_country() {
        assert_eq!(lookup_currency("FR"), Some("EUR".to_string()));
        assert_eq!(lookup_currency("fr"), Some("EUR".to_string()));
    }

    #[test]
    fn test_lookup_unknown_country() {
        assert_eq!(lookup_currency("ZZ"), None);
    }

    #[tokio::test]
    async fn test_capability_execute() {
        let cap = CurrencyCapability::new();
        let out = cap
            .execute(json!({"country_code": "JP"}))
            .await
            .unwrap();
        assert_eq!(out.content, r#"{"currency":"JPY"}"#);
    }

    #[tokio::test]
    async fn test_capability_unknown_country_errors() {
        let cap = CurrencyCapability::new();
        assert!(cap.execute(json!({"country_code": "ZZ"})).await.is_err());
    }

    #[test]
    fn test_verifier_currency_lookup_matches_table() {
        let lookup = verifier_currency_lookup();
        assert_eq!(lookup("DE"), Some("EUR".to_string()));
    }
}
