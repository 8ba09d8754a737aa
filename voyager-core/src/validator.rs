//! Pure structural/temporal validation of an [`Itinerary`], independent of
//! any provider or network call.
//!
//! `validate` accumulates every violation rather than short-circuiting on
//! the first one, matching the spec's "Failure semantics" for §4.1: callers
//! get one aggregated error value enumerating every problem at once.

use crate::itinerary::{Edge, Graph, Itinerary, JourneyType, Node};
use chrono::Utc;
use std::collections::{HashMap, HashSet};

/// One violation found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All violations found while validating one itinerary. Non-empty means
/// the itinerary is invalid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<Violation>);

impl ValidationErrors {
    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self.0.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; ");
        write!(f, "{joined}")
    }
}

/// Validate an itinerary against every rule in the §4.1 table, accumulating
/// all violations. Never mutates `itinerary`.
pub fn validate(itinerary: &Itinerary) -> ValidationErrors {
    let mut errors = Vec::new();

    validate_header(itinerary, &mut errors);
    validate_graph(&itinerary.graph, "graph", &mut errors);
    validate_journey_type(itinerary, &mut errors);

    ValidationErrors(errors)
}

fn validate_header(itinerary: &Itinerary, errors: &mut Vec<Violation>) {
    if itinerary.title.trim().is_empty() {
        errors.push(Violation::new("title", "must be non-empty"));
    }
    if itinerary.travelers < 1 {
        errors.push(Violation::new("travelers", "must be >= 1"));
    }
    match itinerary.start_time {
        None => errors.push(Violation::new("start_time", "must be set")),
        Some(start) => {
            let yesterday = Utc::now().date_naive().pred_opt().map(|d| d.and_hms_opt(0, 0, 0).unwrap());
            if let Some(yesterday) = yesterday {
                let yesterday_utc = yesterday.and_utc();
                if start < yesterday_utc {
                    errors.push(Violation::new("start_time", "must not be earlier than yesterday"));
                }
            }
        }
    }
    match (itinerary.start_time, itinerary.end_time) {
        (_, None) => errors.push(Violation::new("end_time", "must be set")),
        (Some(start), Some(end)) if end < start => {
            errors.push(Violation::new("end_time", "must be >= start_time"));
        }
        _ => {}
    }
    if itinerary.journey_type == JourneyType::Unspecified {
        errors.push(Violation::new("journey_type", "must not be UNSPECIFIED"));
    }
}

fn validate_graph(graph: &Graph, path: &str, errors: &mut Vec<Violation>) {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for (i, node) in graph.nodes.iter().enumerate() {
        let node_path = format!("{path}.nodes[{i}]");
        if node.id.is_empty() {
            errors.push(Violation::new(&node_path, "id must be non-empty"));
        } else if !seen_ids.insert(node.id.as_str()) {
            errors.push(Violation::new(&node_path, format!("duplicate node id '{}'", node.id)));
        }
        validate_node(node, &node_path, errors);
    }

    let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    for (i, edge) in graph.edges.iter().enumerate() {
        let edge_path = format!("{path}.edges[{i}]");
        if !node_ids.contains(edge.from_id.as_str()) {
            errors.push(Violation::new(&edge_path, format!("from_id '{}' does not resolve to a node", edge.from_id)));
        }
        if !node_ids.contains(edge.to_id.as_str()) {
            errors.push(Violation::new(&edge_path, format!("to_id '{}' does not resolve to a node", edge.to_id)));
        }
        validate_edge(edge, &edge_path, errors);
    }

    if let Some(sub) = &graph.sub_graph {
        validate_graph(sub, &format!("{path}.sub_graph"), errors);
    }
}

fn validate_node(node: &Node, path: &str, errors: &mut Vec<Violation>) {
    if node.location.name.is_empty() && node.location.city.is_empty() && node.location.best_code().is_none() {
        errors.push(Violation::new(format!("{path}.location"), "must be present"));
    }
    if let (Some(from), Some(to)) = (node.from_timestamp, node.to_timestamp) {
        if to <= from {
            errors.push(Violation::new(format!("{path}.to_timestamp"), "must be > from_timestamp"));
        }
    }
    if let Some(stay) = &node.stay {
        let stay_path = format!("{path}.stay");
        match (stay.check_in, stay.check_out) {
            (None, _) => errors.push(Violation::new(format!("{stay_path}.check_in"), "must be present")),
            (_, None) => errors.push(Violation::new(format!("{stay_path}.check_out"), "must be present")),
            (Some(ci), Some(co)) if co <= ci => {
                errors.push(Violation::new(format!("{stay_path}.check_out"), "must be > check_in"));
            }
            _ => {}
        }
        if stay.traveler_count < 1 {
            errors.push(Violation::new(format!("{stay_path}.traveler_count"), "must be >= 1"));
        }
        if let Some(cost) = &stay.cost {
            if cost.currency.is_empty() {
                errors.push(Violation::new(format!("{stay_path}.cost.currency"), "must be non-empty when cost is present"));
            }
        }
    }
}

fn validate_edge(edge: &Edge, path: &str, errors: &mut Vec<Violation>) {
    let t = &edge.transport;
    if t.origin_location.is_none() {
        errors.push(Violation::new(format!("{path}.transport.origin_location"), "must be non-nil"));
    }
    if t.destination_location.is_none() {
        errors.push(Violation::new(format!("{path}.transport.destination_location"), "must be non-nil"));
    }
    if t.traveler_count < 1 {
        errors.push(Violation::new(format!("{path}.transport.traveler_count"), "must be >= 1"));
    }
    if let Some(cost) = &t.cost {
        if cost.currency.is_empty() {
            errors.push(Violation::new(format!("{path}.transport.cost.currency"), "must be non-empty when cost is present"));
        }
    }

    if t.transport_type == crate::itinerary::TransportType::Flight {
        match &t.detail {
            None => errors.push(Violation::new(format!("{path}.transport.detail"), "flight detail must be present")),
            Some(flight) => {
                if flight.departure_time.is_none() {
                    errors.push(Violation::new(format!("{path}.transport.detail.departure_time"), "must be set"));
                }
                if let (Some(dep), Some(arr)) = (flight.departure_time, flight.arrival_time) {
                    if arr <= dep {
                        errors.push(Violation::new(format!("{path}.transport.detail.arrival_time"), "must be > departure_time"));
                    }
                }
            }
        }
    }
}

fn validate_journey_type(itinerary: &Itinerary, errors: &mut Vec<Violation>) {
    let has_cycle = graph_has_cycle(&itinerary.graph);
    match itinerary.journey_type {
        JourneyType::Return if !has_cycle => {
            errors.push(Violation::new("journey_type", "RETURN itinerary must contain a directed cycle"));
        }
        JourneyType::OneWay if has_cycle => {
            errors.push(Violation::new("journey_type", "ONE_WAY itinerary must be acyclic"));
        }
        _ => {}
    }
}

/// DFS-with-recursion-stack directed-cycle detection over the edge set.
fn graph_has_cycle(graph: &Graph) -> bool {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &graph.edges {
        adjacency.entry(edge.from_id.as_str()).or_default().push(edge.to_id.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();

    fn dfs<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
    ) -> bool {
        if on_stack.contains(node) {
            return true;
        }
        if visited.contains(node) {
            return false;
        }
        visited.insert(node);
        on_stack.insert(node);
        if let Some(neighbors) = adjacency.get(node) {
            for &next in neighbors {
                if dfs(next, adjacency, visited, on_stack) {
                    return true;
                }
            }
        }
        on_stack.remove(node);
        false
    }

    for node in &graph.nodes {
        if dfs(node.id.as_str(), &adjacency, &mut visited, &mut on_stack) {
            return true;
        }
    }
    false
}
