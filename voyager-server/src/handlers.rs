//! The `PlanTrip` RPC (spec §6): `{query, history?} -> {itineraries: Itinerary[]}`.
//!
//! Grounded in the teacher's `health_handler`/`api_approval_decision_handler`
//! style (`gateway/server.rs`): `State<Shared>` extraction, a bare lock,
//! `axum::Json` bodies, `(StatusCode, Json)` tuples for error responses.

use crate::state::SharedState;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use voyager_core::error::OrchestratorError;
use voyager_core::itinerary::{ErrorCode, Itinerary, ItemError, Severity};

pub fn router(shared: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/plan-trip", post(plan_trip_handler))
        .with_state(shared)
}

async fn health_handler() -> impl axum::response::IntoResponse {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct PlanTripRequest {
    query: String,
    #[serde(default)]
    history: String,
}

#[derive(Debug, Serialize)]
struct PlanTripResponse {
    itineraries: Vec<Itinerary>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: &'static str,
    message: String,
}

async fn plan_trip_handler(
    State(shared): State<SharedState>,
    axum::Json(req): axum::Json<PlanTripRequest>,
) -> (StatusCode, axum::Json<serde_json::Value>) {
    if req.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!(RpcError {
                code: "INVALID_ARGUMENT",
                message: "query must not be empty".to_string(),
            })),
        );
    }

    let cancellation = CancellationToken::new();
    let orchestrator = shared.orchestrator().lock().await;
    match orchestrator
        .orchestrate(&req.query, req.history, &cancellation)
        .await
    {
        Ok(result) => {
            let itineraries = if result.itineraries.is_empty() {
                vec![Itinerary {
                    title: "Clarification needed".to_string(),
                    error: Some(ItemError {
                        message: result.text,
                        code: ErrorCode::InvalidInput,
                        severity: Severity::Info,
                    }),
                    ..Itinerary::default()
                }]
            } else {
                result.itineraries
            };
            (
                StatusCode::OK,
                axum::Json(serde_json::json!(PlanTripResponse { itineraries })),
            )
        }
        Err(OrchestratorError::EmptyQuery) => (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!(RpcError {
                code: "INVALID_ARGUMENT",
                message: "query must not be empty".to_string(),
            })),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(serde_json::json!(RpcError {
                code: "INTERNAL",
                message: err.to_string(),
            })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;
    use voyager_core::config::{OrchestratorConfig, PlannerConfig, VerifierConfig};
    use voyager_core::inventory::MockInventoryProvider;
    use voyager_core::orchestrator::Orchestrator;
    use voyager_core::planner::Planner;
    use voyager_core::verifier::Verifier;

    fn test_shared_state() -> SharedState {
        let provider = Arc::new(voyager_core::brain::MockLlmProvider::new());
        let planner = Planner::new(provider, PlannerConfig::default());
        let inventory = Arc::new(MockInventoryProvider::new());
        let verifier = Verifier::new(inventory, Arc::new(|_: &str| None), VerifierConfig::default());
        let orchestrator = Orchestrator::new(planner, verifier, OrchestratorConfig::default());
        SharedState::new(orchestrator)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(test_shared_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_plan_trip_rejects_empty_query() {
        let app = router(test_shared_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/plan-trip")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({"query": ""}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
