//! The itinerary graph data model: locations, costs, transports, stays,
//! nodes, edges, and the top-level `Itinerary`.
//!
//! All identifiers are strings unique within one itinerary. All timestamps
//! are absolute instants (UTC). This module defines the shapes only;
//! structural and temporal invariants are enforced by [`crate::validator`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A place: an airport, city, or address, identified by one or more codes.
///
/// At least one of `city_code` or a non-empty `iata_codes` must be present
/// for any Location used by the Verifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city_code: String,
    #[serde(default)]
    pub iata_codes: Vec<String>,
}

impl Location {
    /// The best available code for this location: a specific IATA code
    /// takes priority over the city code.
    pub fn best_code(&self) -> Option<&str> {
        self.iata_codes
            .first()
            .map(|s| s.as_str())
            .or_else(|| (!self.city_code.is_empty()).then_some(self.city_code.as_str()))
    }

    /// Merge in another location's codes/city/country where this one is
    /// missing them, without discarding anything already present.
    pub fn enrich_from(&mut self, other: &Location) {
        if self.city.is_empty() {
            self.city = other.city.clone();
        }
        if self.country.is_empty() {
            self.country = other.country.clone();
        }
        if self.city_code.is_empty() {
            self.city_code = other.city_code.clone();
        }
        for code in &other.iata_codes {
            if !self.iata_codes.contains(code) {
                self.iata_codes.push(code.clone());
            }
        }
    }
}

/// A monetary value with its ISO-4217 currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub value: Decimal,
    #[serde(default)]
    pub currency: String,
}

/// Flight-specific transport detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    #[serde(default)]
    pub carrier_code: String,
    #[serde(default)]
    pub flight_number: String,
    pub departure_time: Option<DateTime<Utc>>,
    pub arrival_time: Option<DateTime<Utc>>,
}

/// The mode of transport an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportType {
    Flight,
    Train,
    Car,
    Bus,
    Ferry,
    Other,
}

impl Default for TransportType {
    fn default() -> Self {
        TransportType::Other
    }
}

/// A concrete, bookable transport option surfaced by the inventory provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportOption {
    pub cost: Cost,
    pub origin: Location,
    pub destination: Location,
    #[serde(default)]
    pub flight: Option<Flight>,
    #[serde(default)]
    pub baggage_allowance: Option<String>,
}

/// The edge payload: a journey leg between two nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    #[serde(rename = "type")]
    pub transport_type: TransportType,
    pub origin_location: Option<Location>,
    pub destination_location: Option<Location>,
    pub traveler_count: u32,
    pub cost: Option<Cost>,
    pub detail: Option<Flight>,
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub options: Vec<TransportOption>,
    #[serde(default)]
    pub error: Option<ItemError>,
}

/// A concrete, bookable hotel/room option surfaced by the inventory provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HotelOption {
    pub hotel_id: String,
    pub room_description: String,
    pub cost: Cost,
}

/// The node payload: a stay at a location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accommodation {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub location: Location,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub traveler_count: u32,
    pub cost: Option<Cost>,
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub options: Vec<HotelOption>,
    #[serde(default)]
    pub error: Option<ItemError>,
    /// Set to "NO_OFFERS" when a hotel shortlist was found but no bookable
    /// offer could be priced for the requested dates/party size.
    #[serde(default)]
    pub status: Option<String>,
}

/// A waypoint in the itinerary graph: a location visited at some point,
/// optionally with an overnight stay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub location: Location,
    pub from_timestamp: Option<DateTime<Utc>>,
    pub to_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_inter_city: bool,
    #[serde(default)]
    pub stay: Option<Accommodation>,
}

/// A directed journey leg between two nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    pub duration_seconds: u64,
    pub transport: Transport,
}

/// A directed multigraph of nodes joined by edges, with an optional nested
/// sub-graph for intra-destination activities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub sub_graph: Option<Box<Graph>>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }
}

/// Whether the itinerary is a one-way or round trip; governs the cycle
/// invariant enforced by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JourneyType {
    #[default]
    Unspecified,
    OneWay,
    Return,
}

/// A structured, user-facing error annotation attached to an itinerary,
/// transport, or stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub message: String,
    pub code: ErrorCode,
    pub severity: Severity,
}

impl ItemError {
    pub fn new(code: ErrorCode, severity: Severity, message: impl Into<String>) -> Self {
        Self { message: message.into(), code, severity }
    }
}

/// The domain error code taxonomy shared across Planner, Verifier, and the
/// inbound RPC surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DataNotFound,
    ApiLimitReached,
    InvalidInput,
    AuthenticationFailed,
    ConnectionFailed,
    InternalServerError,
    SearchFailed,
    Unspecified,
}

/// The severity of an `ItemError`. Only `Error` triggers orchestrator repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// The top-level plan entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Itinerary {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub travelers: u32,
    pub journey_type: JourneyType,
    pub graph: Graph,
    #[serde(default)]
    pub error: Option<ItemError>,
}

impl Itinerary {
    /// Every transport and stay Cost present anywhere in the graph,
    /// depth-first including sub-graphs.
    pub fn all_costs(&self) -> Vec<&Cost> {
        let mut costs = Vec::new();
        collect_costs(&self.graph, &mut costs);
        costs
    }

    /// Every transport and stay Cost present anywhere in the graph,
    /// mutable, depth-first including sub-graphs.
    pub fn all_costs_mut(&mut self) -> Vec<&mut Cost> {
        let mut costs = Vec::new();
        collect_costs_mut(&mut self.graph, &mut costs);
        costs
    }

    /// Whether any annotated error anywhere in the graph has `Severity::Error`.
    pub fn has_error_severity(&self) -> bool {
        fn graph_has_error(graph: &Graph) -> bool {
            let edge_err = graph.edges.iter().any(|e| {
                e.transport
                    .error
                    .as_ref()
                    .is_some_and(|err| err.severity == Severity::Error)
            });
            let node_err = graph.nodes.iter().any(|n| {
                n.stay
                    .as_ref()
                    .and_then(|s| s.error.as_ref())
                    .is_some_and(|err| err.severity == Severity::Error)
            });
            let sub_err = graph.sub_graph.as_ref().is_some_and(|g| graph_has_error(g));
            edge_err || node_err || sub_err
        }
        graph_has_error(&self.graph)
    }

    /// Collect every item-level error message (non-empty) for use in
    /// repair-feedback summaries.
    pub fn error_summaries(&self) -> Vec<String> {
        let mut out = Vec::new();
        fn walk(graph: &Graph, out: &mut Vec<String>) {
            for e in &graph.edges {
                if let Some(err) = &e.transport.error {
                    out.push(format!("{} → {}: {}", e.from_id, e.to_id, err.message));
                }
            }
            for n in &graph.nodes {
                if let Some(stay) = &n.stay {
                    if let Some(err) = &stay.error {
                        out.push(format!("stay at {}: {}", n.id, err.message));
                    }
                }
            }
            if let Some(sub) = &graph.sub_graph {
                walk(sub, out);
            }
        }
        walk(&self.graph, &mut out);
        out
    }
}

fn collect_costs<'a>(graph: &'a Graph, out: &mut Vec<&'a Cost>) {
    for e in &graph.edges {
        if let Some(c) = &e.transport.cost {
            out.push(c);
        }
    }
    for n in &graph.nodes {
        if let Some(stay) = &n.stay {
            if let Some(c) = &stay.cost {
                out.push(c);
            }
        }
    }
    if let Some(sub) = &graph.sub_graph {
        collect_costs(sub, out);
    }
}

fn collect_costs_mut<'a>(graph: &'a mut Graph, out: &mut Vec<&'a mut Cost>) {
    for e in &mut graph.edges {
        if let Some(c) = &mut e.transport.cost {
            out.push(c);
        }
    }
    for n in &mut graph.nodes {
        if let Some(stay) = &mut n.stay {
            if let Some(c) = &mut stay.cost {
                out.push(c);
            }
        }
    }
    if let Some(sub) = &mut graph.sub_graph {
        collect_costs_mut(sub, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(code: &str) -> Location {
        Location {
            name: code.to_string(),
            iata_codes: vec![code.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_location_best_code_prefers_iata() {
        let l = Location { city_code: "NYC".into(), iata_codes: vec!["JFK".into()], ..Default::default() };
        assert_eq!(l.best_code(), Some("JFK"));
    }

    #[test]
    fn test_location_best_code_falls_back_to_city_code() {
        let l = Location { city_code: "NYC".into(), ..Default::default() };
        assert_eq!(l.best_code(), Some("NYC"));
    }

    #[test]
    fn test_enrich_from_fills_missing_fields_only() {
        let mut a = loc("JFK");
        let mut b = Location { city: "New York".into(), country: "US".into(), ..Default::default() };
        b.iata_codes.push("LGA".into());
        a.enrich_from(&b);
        assert_eq!(a.city, "New York");
        assert!(a.iata_codes.contains(&"JFK".to_string()));
        assert!(a.iata_codes.contains(&"LGA".to_string()));
    }

    #[test]
    fn test_has_error_severity_detects_nested_errors() {
        let mut itin = Itinerary::default();
        itin.graph.edges.push(Edge {
            from_id: "a".into(),
            to_id: "b".into(),
            duration_seconds: 0,
            transport: Transport {
                error: Some(ItemError::new(ErrorCode::DataNotFound, Severity::Error, "no flights")),
                ..Default::default()
            },
        });
        assert!(itin.has_error_severity());
    }

    #[test]
    fn test_all_costs_includes_sub_graph() {
        let mut itin = Itinerary::default();
        let mut sub = Graph::default();
        sub.nodes.push(Node {
            id: "s1".into(),
            stay: Some(Accommodation { cost: Some(Cost { value: Decimal::new(100, 0), currency: "USD".into() }), ..Default::default() }),
            ..Default::default()
        });
        itin.graph.sub_graph = Some(Box::new(sub));
        assert_eq!(itin.all_costs().len(), 1);
    }
}
