//! The Orchestrator: the Plan/Verify/Repair control loop described in
//! spec §4.5. Calls the Planner, fans verification across every proposed
//! candidate concurrently (await-all, no first-success cancel — per the
//! design note in spec §9, every candidate's outcome feeds the repair
//! prompt), partitions results into successes/failures, and either returns
//! successes or reformulates history with failure evidence and re-plans.

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::itinerary::Itinerary;
use crate::planner::{PlanResult, Planner};
use crate::verifier::Verifier;
use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const APOLOGY: &str = "I'm having trouble finding a plan that meets all your requirements. Could you share more details or adjust your preferences?";

/// The result of one `orchestrate` call.
#[derive(Debug, Clone)]
pub struct OrchestrationResult {
    pub text: String,
    pub itineraries: Vec<Itinerary>,
}

pub struct Orchestrator {
    planner: Planner,
    verifier: Verifier,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(planner: Planner, verifier: Verifier, config: OrchestratorConfig) -> Self {
        Self { planner, verifier, config }
    }

    /// `orchestrate(ctx, user_query, history) -> (user_text, itineraries[])`.
    pub async fn orchestrate(
        &self,
        user_query: &str,
        mut history: String,
        cancellation: &CancellationToken,
    ) -> Result<OrchestrationResult, OrchestratorError> {
        if user_query.trim().is_empty() {
            return Err(OrchestratorError::EmptyQuery);
        }

        for iteration in 0..self.config.max_iterations {
            if cancellation.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }

            info!(iteration, "orchestrator planning attempt");
            let plan_result = self.planner.plan(user_query, &history, cancellation).await?;

            let (primary, alternatives, reasoning) = match plan_result {
                PlanResult::Clarification { question } => {
                    return Ok(OrchestrationResult { text: question, itineraries: vec![] });
                }
                PlanResult::Proposal { itinerary, alternatives, reasoning } => (itinerary, alternatives, reasoning),
            };

            let mut candidates = vec![primary];
            candidates.extend(alternatives);
            if candidates.is_empty() {
                return Err(OrchestratorError::NoProposal);
            }

            if cancellation.is_cancelled() {
                return Err(OrchestratorError::Cancelled);
            }

            let verify_futures = candidates.into_iter().map(|candidate| self.verifier.verify(candidate));
            let verified = join_all(verify_futures).await;

            let mut successes = Vec::new();
            let mut failure_summaries = Vec::new();
            for result in verified {
                match result {
                    Ok(itinerary) if !itinerary.has_error_severity() => {
                        successes.push(itinerary);
                    }
                    Ok(itinerary) => {
                        let summary = itinerary.error_summaries().join("; ");
                        failure_summaries.push(format!("'{}': {}", itinerary.title, summary));
                    }
                    Err(e) => {
                        failure_summaries.push(e.to_string());
                    }
                }
            }

            if !successes.is_empty() {
                let text = render_summary(&reasoning, &successes);
                return Ok(OrchestrationResult { text, itineraries: successes });
            }

            warn!(iteration, failures = failure_summaries.len(), "no successful candidate this iteration");
            let bullets = failure_summaries.iter().map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n");
            history.push_str(&format!(
                "\nThe proposed plans had issues:\n{bullets}\nPlease revise.\n"
            ));
        }

        Ok(OrchestrationResult { text: APOLOGY.to_string(), itineraries: vec![] })
    }
}

/// Format a user-visible summary: `reasoning` followed by an ordered list of
/// each successful itinerary's sorted items.
fn render_summary(reasoning: &str, itineraries: &[Itinerary]) -> String {
    let mut out = String::new();
    if !reasoning.is_empty() {
        out.push_str(reasoning);
        out.push('\n');
    }
    for itinerary in itineraries {
        out.push_str(&format!("\n{}\n", itinerary.title));
        for line in render_items(itinerary) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

struct SortableItem {
    depth: usize,
    instant: Option<chrono::DateTime<Utc>>,
    line: String,
}

/// Collect each graph item (stay or transport) with a sort key: stays sort
/// by check-in instant, flights by departure instant, items without a
/// sortable instant go last. Sorted stably; rendered with indent by
/// sub-graph depth.
fn render_items(itinerary: &Itinerary) -> Vec<String> {
    let mut items = Vec::new();
    collect_items(&itinerary.graph, 0, &mut items);
    items.sort_by_key(|i| (i.instant.is_none(), i.instant));
    items.into_iter().map(|i| format!("{}{}", "  ".repeat(i.depth), i.line)).collect()
}

fn collect_items(graph: &crate::itinerary::Graph, depth: usize, out: &mut Vec<SortableItem>) {
    for edge in &graph.edges {
        let instant = edge.transport.detail.as_ref().and_then(|f| f.departure_time);
        let label = match edge.transport.transport_type {
            crate::itinerary::TransportType::Flight => "Flight",
            crate::itinerary::TransportType::Train => "Train",
            crate::itinerary::TransportType::Car => "Car",
            crate::itinerary::TransportType::Bus => "Bus",
            crate::itinerary::TransportType::Ferry => "Ferry",
            crate::itinerary::TransportType::Other => "Transport",
        };
        out.push(SortableItem {
            depth,
            instant,
            line: format!("{label}: {} -> {}", edge.from_id, edge.to_id),
        });
    }
    for node in &graph.nodes {
        if let Some(stay) = &node.stay {
            out.push(SortableItem {
                depth,
                instant: stay.check_in,
                line: format!("Stay: {} at {}", stay.name, node.id),
            });
        }
    }
    if let Some(sub) = &graph.sub_graph {
        collect_items(sub, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::config::{OrchestratorConfig, PlannerConfig, VerifierConfig};
    use crate::inventory::{FlightOption, HotelOffer, HotelSummary, MockInventoryProvider};
    use crate::itinerary::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn loc(code: &str) -> Location {
        Location { name: code.into(), iata_codes: vec![code.into()], country: "GB".into(), ..Default::default() }
    }

    fn one_way_itinerary(origin_code: &str) -> serde_json::Value {
        let now = Utc::now();
        serde_json::json!({
            "itineraries": [{
                "title": "Trip",
                "description": "",
                "start_time": now.to_rfc3339(),
                "end_time": (now + Duration::days(2)).to_rfc3339(),
                "travelers": 1,
                "journey_type": "ONE_WAY",
                "graph": {
                    "nodes": [
                        { "id": "a", "location": { "name": origin_code, "city": "", "country": "", "city_code": "", "iata_codes": [origin_code] } },
                        { "id": "b", "location": { "name": "JFK", "city": "", "country": "", "city_code": "", "iata_codes": ["JFK"] },
                          "stay": { "name": "Hotel", "address": "", "location": { "name": "JFK", "city": "", "country": "", "city_code": "", "iata_codes": ["JFK"] },
                                    "check_in": (now + Duration::days(1)).to_rfc3339(), "check_out": (now + Duration::days(2)).to_rfc3339(), "traveler_count": 1 } }
                    ],
                    "edges": [
                        { "from_id": "a", "to_id": "b", "duration_seconds": 25200,
                          "transport": { "type": "FLIGHT", "origin_location": { "name": origin_code, "city": "", "country": "", "city_code": "", "iata_codes": [origin_code] },
                                         "destination_location": { "name": "JFK", "city": "", "country": "", "city_code": "", "iata_codes": ["JFK"] },
                                         "traveler_count": 1, "detail": { "departure_time": (now + Duration::days(1)).to_rfc3339() } } }
                    ]
                }
            }],
            "reasoning": "a simple one-hop trip"
        })
    }

    fn seeded_inventory(origin_code: &str) -> MockInventoryProvider {
        let provider = MockInventoryProvider::new();
        provider.seed_flight(
            origin_code,
            "JFK",
            FlightOption {
                carrier_code: "BA".into(),
                flight_number: "117".into(),
                origin: loc(origin_code),
                destination: loc("JFK"),
                departure_time: Utc::now(),
                arrival_time: Utc::now() + Duration::hours(8),
                cost: Cost { value: Decimal::new(200, 0), currency: "USD".into() },
                baggage_allowance: None,
            },
        );
        provider.seed_hotels_by_city("JFK", vec![HotelSummary { hotel_id: "h1".into(), name: "Hotel".into(), rating: None }]);
        provider.seed_hotel_offer(
            "h1",
            HotelOffer { hotel_id: "h1".into(), room_description: "Queen".into(), cost: Cost { value: Decimal::new(150, 0), currency: "USD".into() } },
        );
        provider
    }

    fn orchestrator_with(llm: MockLlmProvider, inventory: MockInventoryProvider) -> Orchestrator {
        let planner = Planner::new(Arc::new(llm), PlannerConfig::default());
        let verifier = Verifier::new(Arc::new(inventory), Arc::new(|_: &str| Some("USD".to_string())), VerifierConfig::default());
        Orchestrator::new(planner, verifier, OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn test_clarification_short_circuits_without_verification() {
        let llm = MockLlmProvider::new();
        llm.queue_response(MockLlmProvider::tool_call_response(
            "ask_user",
            serde_json::json!({ "question": "Where to?" }),
        ));
        let orchestrator = orchestrator_with(llm, MockInventoryProvider::new());
        let result = orchestrator.orchestrate("a trip", String::new(), &CancellationToken::new()).await.unwrap();
        assert_eq!(result.text, "Where to?");
        assert!(result.itineraries.is_empty());
    }

    #[tokio::test]
    async fn test_happy_path_one_candidate() {
        let llm = MockLlmProvider::new();
        llm.queue_response(MockLlmProvider::text_response(&one_way_itinerary("LHR").to_string()));
        let orchestrator = orchestrator_with(llm, seeded_inventory("LHR"));
        let result = orchestrator.orchestrate("fly LHR to JFK", String::new(), &CancellationToken::new()).await.unwrap();
        assert_eq!(result.itineraries.len(), 1);
        assert!(!result.itineraries[0].has_error_severity());
        assert!(result.text.contains("Flight"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let orchestrator = orchestrator_with(MockLlmProvider::new(), MockInventoryProvider::new());
        let result = orchestrator.orchestrate("   ", String::new(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(OrchestratorError::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_iteration_budget_exhausted_returns_apology() {
        let llm = MockLlmProvider::new();
        for _ in 0..6 {
            llm.queue_response(MockLlmProvider::text_response(&one_way_itinerary("FAIL").to_string()));
        }
        let mut config = OrchestratorConfig::default();
        config.max_iterations = 2;
        let planner = Planner::new(Arc::new(llm), PlannerConfig::default());
        let verifier = Verifier::new(Arc::new(MockInventoryProvider::new()), Arc::new(|_: &str| Some("USD".to_string())), VerifierConfig::default());
        let orchestrator = Orchestrator::new(planner, verifier, config);
        let result = orchestrator.orchestrate("impossible trip", String::new(), &CancellationToken::new()).await.unwrap();
        assert!(result.itineraries.is_empty());
        assert_eq!(result.text, APOLOGY);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_promptly() {
        let llm = MockLlmProvider::new();
        llm.queue_response(MockLlmProvider::text_response(&one_way_itinerary("LHR").to_string()));
        let orchestrator = orchestrator_with(llm, seeded_inventory("LHR"));
        let token = CancellationToken::new();
        token.cancel();
        let result = orchestrator.orchestrate("fly somewhere", String::new(), &token).await;
        assert!(matches!(result, Err(OrchestratorError::Cancelled)));
    }
}
