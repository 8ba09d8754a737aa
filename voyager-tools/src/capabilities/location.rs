//! The `location` capability: resolves a free-form keyword to a ranked list
//! of candidate `Location`s (spec §4.2), filling `iata_codes` and `city_code`.
//! This is the only way the Planner ever turns a human-readable place name
//! into a code — the core itself never resolves locations on its own
//! (spec §1 Non-goals).

use crate::error::CapabilityError;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use voyager_core::itinerary::Location;
use voyager_core::types::ToolOutput;

use crate::registry::Capability;

/// A small built-in gazetteer covering common destinations. Real deployments
/// should inject a richer lookup via `with_gazetteer` (e.g. backed by a geo
/// database or a third-party locations API).
fn default_gazetteer(query: &str) -> Vec<Location> {
    let needle = query.trim().to_lowercase();
    KNOWN_PLACES
        .iter()
        .filter(|place| place.name.to_lowercase().contains(&needle) || needle.contains(&place.name.to_lowercase()))
        .map(|place| Location {
            name: place.name.to_string(),
            city: place.city.to_string(),
            country: place.country.to_string(),
            city_code: place.city_code.to_string(),
            iata_codes: place.iata_codes.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}

struct KnownPlace {
    name: &'static str,
    city: &'static str,
    country: &'static str,
    city_code: &'static str,
    iata_codes: &'static [&'static str],
}

const KNOWN_PLACES: &[KnownPlace] = &[
    KnownPlace { name: "paris", city: "Paris", country: "FR", city_code: "PAR", iata_codes: &["CDG", "ORY"] },
    KnownPlace { name: "london", city: "London", country: "GB", city_code: "LON", iata_codes: &["LHR", "LGW", "STN"] },
    KnownPlace { name: "new york", city: "New York", country: "US", city_code: "NYC", iata_codes: &["JFK", "EWR", "LGA"] },
    KnownPlace { name: "tokyo", city: "Tokyo", country: "JP", city_code: "TYO", iata_codes: &["NRT", "HND"] },
    KnownPlace { name: "san francisco", city: "San Francisco", country: "US", city_code: "SFO", iata_codes: &["SFO"] },
    KnownPlace { name: "rome", city: "Rome", country: "IT", city_code: "ROM", iata_codes: &["FCO"] },
    KnownPlace { name: "berlin", city: "Berlin", country: "DE", city_code: "BER", iata_codes: &["BER"] },
    KnownPlace { name: "sydney", city: "Sydney", country: "AU", city_code: "SYD", iata_codes: &["SYD"] },
    KnownPlace { name: "singapore", city: "Singapore", country: "SG", city_code: "SIN", iata_codes: &["SIN"] },
    KnownPlace { name: "dubai", city: "Dubai", country: "AE", city_code: "DXB", iata_codes: &["DXB"] },
];

/// The `location` capability exposed to the Planner.
pub struct LocationCapability {
    gazetteer: Arc<dyn Fn(&str) -> Vec<Location> + Send + Sync>,
}

impl LocationCapability {
    pub fn new() -> Self {
        Self {
            gazetteer: Arc::new(default_gazetteer),
        }
    }

    /// Construct with a custom lookup, e.g. backed by a real locations API.
    pub fn with_gazetteer(lookup: impl Fn(&str) -> Vec<Location> + Send + Sync + 'static) -> Self {
        Self {
            gazetteer: Arc::new(lookup),
        }
    }
}

impl Default for LocationCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for LocationCapability {
    fn name(&self) -> &str {
        "location"
    }

    fn description(&self) -> &str {
        "Resolves a free-form place name (e.g. 'Paris', 'Tokyo') to a ranked \
         list of candidate locations with IATA and city codes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-form place name to resolve"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, CapabilityError> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| CapabilityError::InvalidArguments {
                name: "location".to_string(),
                reason: "missing 'query' parameter".to_string(),
            })?;

        let matches = (self.gazetteer)(query);
        Ok(ToolOutput::json(&json!(matches)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolves_known_city() {
        let cap = LocationCapability::new();
        let out = cap.execute(json!({"query": "Paris"})).await.unwrap();
        let locations: Vec<Location> = serde_json::from_str(&out.content).unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].best_code(), Some("CDG"));
    }

    #[tokio::test]
    async fn test_unknown_place_returns_empty() {
        let cap = LocationCapability::new();
        let out = cap.execute(json!({"query": "Nowheresville"})).await.unwrap();
        let locations: Vec<Location> = serde_json::from_str(&out.content).unwrap();
        assert!(locations.is_empty());
    }

    #[tokio::test]
    async fn test_custom_gazetteer() {
        let cap = LocationCapability::with_gazetteer(|_| {
            vec![Location {
                name: "Testville".to_string(),
                city: "Testville".to_string(),
                country: "ZZ".to_string(),
                city_code: "TST".to_string(),
                iata_codes: vec!["TST".to_string()],
            }]
        });
        let out = cap.execute(json!({"query": "anything"})).await.unwrap();
        let locations: Vec<Location> = serde_json::from_str(&out.content).unwrap();
        assert_eq!(locations[0].city_code, "TST");
    }

    #[tokio::test]
    async fn test_missing_query_argument() {
        let cap = LocationCapability::new();
        assert!(cap.execute(json!({})).await.is_err());
    }
}
