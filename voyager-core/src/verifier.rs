//! The Verifier: enriches a proposed itinerary with real transport and stay
//! options from live inventory, annotating unverifiable items with
//! structured errors. Never mutates graph topology, ids, times, or counts.
//!
//! Concurrency within one itinerary (edges and nodes verified in parallel,
//! each task owning its own edge/node) mirrors the teacher's council
//! parallel-fan-out pattern (`council.rs::stage_parallel_query`), generalized
//! from "query N LLM providers" to "verify N graph items".

use crate::config::VerifierConfig;
use crate::error::VerifierError;
use crate::inventory::{InventoryError, InventoryProvider};
use crate::itinerary::{
    Edge, ErrorCode, Graph, HotelOption, Itinerary, ItemError, Node, Severity, TransportOption, TransportType,
};
use crate::validator;
use futures::future::join_all;
use std::sync::Arc;

/// Maps an inventory provider error onto the domain `ErrorCode` taxonomy
/// per spec §4.4 step 5. Grounded in the teacher's `map_http_error`.
fn map_inventory_error(err: &InventoryError) -> ItemError {
    match err {
        InventoryError::NotFound(msg) => ItemError::new(ErrorCode::DataNotFound, Severity::Error, msg.clone()),
        InventoryError::RateLimited { retry_after_secs } => ItemError::new(
            ErrorCode::ApiLimitReached,
            Severity::Error,
            format!("rate limited, retry after {retry_after_secs}s"),
        ),
        InventoryError::InvalidInput(msg) => ItemError::new(ErrorCode::InvalidInput, Severity::Error, msg.clone()),
        InventoryError::AuthenticationFailed => {
            ItemError::new(ErrorCode::AuthenticationFailed, Severity::Error, "authentication failed")
        }
        InventoryError::ConnectionFailed(msg) => {
            ItemError::new(ErrorCode::ConnectionFailed, Severity::Error, msg.clone())
        }
        InventoryError::ServerError(msg) => {
            ItemError::new(ErrorCode::InternalServerError, Severity::Error, msg.clone())
        }
        InventoryError::SearchFailed(msg) => ItemError::new(ErrorCode::SearchFailed, Severity::Error, msg.clone()),
    }
}

pub struct Verifier {
    inventory: Arc<dyn InventoryProvider>,
    currency_lookup: Arc<dyn Fn(&str) -> Option<String> + Send + Sync>,
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(
        inventory: Arc<dyn InventoryProvider>,
        currency_lookup: Arc<dyn Fn(&str) -> Option<String> + Send + Sync>,
        config: VerifierConfig,
    ) -> Self {
        Self { inventory, currency_lookup, config }
    }

    /// `verify(ctx, itinerary) -> itinerary'`. Runs the §4.1 pre-check first;
    /// on failure returns the validation error without any network calls.
    pub async fn verify(&self, itinerary: Itinerary) -> Result<Itinerary, VerifierError> {
        let errors = validator::validate(&itinerary);
        if !errors.is_valid() {
            return Err(VerifierError::ValidationFailed(errors.to_string()));
        }

        let mut itinerary = itinerary;
        let currency = self.stamp_currency(&mut itinerary);
        self.verify_graph(&mut itinerary.graph, &currency).await;
        Ok(itinerary)
    }

    /// Determine a single itinerary currency: the first non-empty currency
    /// found across existing Costs, else derived from the origin country,
    /// else USD. Stamp it onto every Cost before searching.
    fn stamp_currency(&self, itinerary: &mut Itinerary) -> String {
        let existing = itinerary
            .all_costs()
            .into_iter()
            .map(|c| c.currency.clone())
            .find(|c| !c.is_empty());

        let currency = existing.unwrap_or_else(|| {
            let origin_country = itinerary.graph.nodes.first().map(|n| n.location.country.as_str()).unwrap_or("");
            (self.currency_lookup)(origin_country).unwrap_or_else(|| self.config.settlement_currency.clone())
        });

        for cost in itinerary.all_costs_mut() {
            cost.currency = currency.clone();
        }
        currency
    }

    /// Depth-first: verify this graph's edges and nodes concurrently, then
    /// recurse into the sub-graph if present. Bounded by the source tree's
    /// own depth — recursion terminates naturally once `sub_graph` is `None`.
    async fn verify_graph(&self, graph: &mut Graph, currency: &str) {
        let edge_snapshots: Vec<Edge> = graph.edges.clone();
        let edge_futures = edge_snapshots.iter().map(|e| self.verify_edge(e.clone(), currency));
        let verified_edges = join_all(edge_futures).await;
        graph.edges = verified_edges;

        let node_snapshots: Vec<Node> = graph.nodes.clone();
        let node_futures = node_snapshots.iter().map(|n| self.verify_node(n.clone(), currency));
        let verified_nodes = join_all(node_futures).await;
        graph.nodes = verified_nodes;

        if let Some(sub) = &mut graph.sub_graph {
            Box::pin(self.verify_graph(sub, currency)).await;
        }
    }

    async fn verify_edge(&self, mut edge: Edge, currency: &str) -> Edge {
        if edge.transport.transport_type != TransportType::Flight {
            return edge;
        }
        let (Some(origin), Some(destination)) =
            (edge.transport.origin_location.clone(), edge.transport.destination_location.clone())
        else {
            return edge;
        };
        let (Some(origin_code), Some(destination_code)) = (origin.best_code(), destination.best_code()) else {
            edge.transport.error = Some(ItemError::new(
                ErrorCode::InvalidInput,
                Severity::Error,
                "edge endpoints carry no resolvable location code",
            ));
            return edge;
        };
        let departure_date = edge
            .transport
            .detail
            .as_ref()
            .and_then(|f| f.departure_time)
            .unwrap_or_else(chrono::Utc::now);

        let result = self
            .inventory
            .search_flights(origin_code, destination_code, departure_date, edge.transport.traveler_count, currency)
            .await;

        match result {
            Ok(options) if options.is_empty() => {
                edge.transport.error = Some(ItemError::new(
                    ErrorCode::DataNotFound,
                    Severity::Error,
                    format!("no flights for {origin_code} -> {destination_code}"),
                ));
            }
            Ok(options) => {
                edge.transport.error = None;
                edge.transport.options = options
                    .into_iter()
                    .take(self.config.flight_limit)
                    .map(|opt| {
                        let mut opt_origin = opt.origin.clone();
                        opt_origin.enrich_from(&origin);
                        let mut opt_destination = opt.destination.clone();
                        opt_destination.enrich_from(&destination);
                        TransportOption {
                            cost: opt.cost,
                            origin: opt_origin,
                            destination: opt_destination,
                            flight: Some(crate::itinerary::Flight {
                                carrier_code: opt.carrier_code,
                                flight_number: opt.flight_number,
                                departure_time: Some(opt.departure_time),
                                arrival_time: Some(opt.arrival_time),
                            }),
                            baggage_allowance: opt.baggage_allowance,
                        }
                    })
                    .collect();
            }
            Err(e) => {
                edge.transport.error = Some(map_inventory_error(&e));
            }
        }
        edge
    }

    async fn verify_node(&self, mut node: Node, currency: &str) -> Node {
        let Some(mut stay) = node.stay.clone() else {
            return node;
        };
        let Some(city_code) = stay.location.best_code().map(|s| s.to_string()) else {
            stay.error = Some(ItemError::new(
                ErrorCode::InvalidInput,
                Severity::Error,
                "stay location carries no resolvable code",
            ));
            node.stay = Some(stay);
            return node;
        };

        let summaries = match self.inventory.search_hotels_by_city(&city_code).await {
            Ok(s) if s.is_empty() => {
                stay.error =
                    Some(ItemError::new(ErrorCode::DataNotFound, Severity::Error, format!("no hotels in {city_code}")));
                node.stay = Some(stay);
                return node;
            }
            Ok(s) => s,
            Err(e) => {
                stay.error = Some(map_inventory_error(&e));
                node.stay = Some(stay);
                return node;
            }
        };

        let hotel_ids: Vec<String> =
            summaries.into_iter().take(self.config.hotel_limit).map(|s| s.hotel_id).collect();

        let (Some(check_in), Some(check_out)) = (stay.check_in, stay.check_out) else {
            stay.error = Some(ItemError::new(ErrorCode::InvalidInput, Severity::Error, "stay missing check_in/check_out"));
            node.stay = Some(stay);
            return node;
        };

        match self
            .inventory
            .search_hotel_offers(&hotel_ids, stay.traveler_count, check_in, check_out, currency)
            .await
        {
            Ok(offers) if offers.is_empty() => {
                stay.status = Some("NO_OFFERS".to_string());
                stay.error = Some(ItemError::new(ErrorCode::DataNotFound, Severity::Error, "no offers for shortlisted hotels"));
            }
            Ok(offers) => {
                stay.error = None;
                stay.status = None;
                stay.options = offers
                    .into_iter()
                    .map(|o| HotelOption { hotel_id: o.hotel_id, room_description: o.room_description, cost: o.cost })
                    .collect();
            }
            Err(e) => {
                stay.error = Some(map_inventory_error(&e));
            }
        }
        node.stay = Some(stay);
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{FlightOption, HotelOffer, HotelSummary, MockInventoryProvider};
    use crate::itinerary::*;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    fn loc(code: &str) -> Location {
        Location { name: code.into(), iata_codes: vec![code.into()], country: "GB".into(), ..Default::default() }
    }

    fn flight_itinerary() -> Itinerary {
        let now = Utc::now();
        Itinerary {
            title: "LHR to JFK".into(),
            start_time: Some(now),
            end_time: Some(now + Duration::days(2)),
            travelers: 1,
            journey_type: JourneyType::OneWay,
            graph: Graph {
                nodes: vec![
                    Node { id: "a".into(), location: loc("LHR"), ..Default::default() },
                    Node {
                        id: "b".into(),
                        location: loc("JFK"),
                        stay: Some(Accommodation {
                            name: "Hotel".into(),
                            location: loc("JFK"),
                            check_in: Some(now + Duration::days(1)),
                            check_out: Some(now + Duration::days(2)),
                            traveler_count: 1,
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ],
                edges: vec![Edge {
                    from_id: "a".into(),
                    to_id: "b".into(),
                    duration_seconds: 25200,
                    transport: Transport {
                        transport_type: TransportType::Flight,
                        origin_location: Some(loc("LHR")),
                        destination_location: Some(loc("JFK")),
                        traveler_count: 1,
                        detail: Some(Flight { departure_time: Some(now + Duration::days(1)), ..Default::default() }),
                        ..Default::default()
                    },
                }],
                sub_graph: None,
            },
            ..Default::default()
        }
    }

    fn verifier_with(provider: MockInventoryProvider) -> Verifier {
        Verifier::new(
            Arc::new(provider),
            Arc::new(|_country: &str| Some("USD".to_string())),
            VerifierConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_verify_populates_flight_and_hotel_options() {
        let provider = MockInventoryProvider::new();
        provider.seed_flight(
            "LHR",
            "JFK",
            FlightOption {
                carrier_code: "BA".into(),
                flight_number: "117".into(),
                origin: loc("LHR"),
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

        let verifier = verifier_with(provider);
        let result = verifier.verify(flight_itinerary()).await.unwrap();

        assert!(result.graph.edges[0].transport.options.len() >= 1);
        assert!(result.graph.nodes[1].stay.as_ref().unwrap().options.len() >= 1);
        assert!(!result.has_error_severity());
    }

    #[tokio::test]
    async fn test_verify_rejects_invalid_itinerary_without_network_calls() {
        let mut itin = flight_itinerary();
        itin.journey_type = JourneyType::Return; // no cycle present -> invalid
        let provider = MockInventoryProvider::new();
        let verifier = verifier_with(provider);
        let result = verifier.verify(itin).await;
        assert!(matches!(result, Err(VerifierError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_verify_annotates_data_not_found_on_empty_flights() {
        let provider = MockInventoryProvider::new();
        let verifier = verifier_with(provider);
        let result = verifier.verify(flight_itinerary()).await.unwrap();
        let err = result.graph.edges[0].transport.error.as_ref().unwrap();
        assert_eq!(err.code, ErrorCode::DataNotFound);
    }

    #[tokio::test]
    async fn test_currency_stamped_from_origin_country() {
        let provider = MockInventoryProvider::new();
        let verifier = Verifier::new(
            Arc::new(provider),
            Arc::new(|country: &str| if country == "FR" { Some("EUR".to_string()) } else { None }),
            VerifierConfig::default(),
        );
        let mut itin = flight_itinerary();
        itin.graph.nodes[0].location.country = "FR".into();
        itin.graph.edges[0].transport.cost = None;
        let result = verifier.verify(itin).await.unwrap();
        // no costs were present so currency derives from origin country
        assert!(result.all_costs().is_empty() || result.all_costs().iter().all(|c| c.currency == "EUR"));
    }

    #[tokio::test]
    async fn test_verify_is_idempotent_in_structure() {
        let provider = MockInventoryProvider::new();
        provider.seed_flight(
            "LHR",
            "JFK",
            FlightOption {
                carrier_code: "BA".into(),
                flight_number: "117".into(),
                origin: loc("LHR"),
                destination: loc("JFK"),
                departure_time: Utc::now(),
                arrival_time: Utc::now() + Duration::hours(8),
                cost: Cost { value: Decimal::new(200, 0), currency: "USD".into() },
                baggage_allowance: None,
            },
        );
        let verifier = verifier_with(provider);
        let once = verifier.verify(flight_itinerary()).await.unwrap();
        let twice = verifier.verify(once.clone()).await.unwrap();
        assert_eq!(once.graph.edges[0].transport.options.len(), twice.graph.edges[0].transport.options.len());
    }
}
