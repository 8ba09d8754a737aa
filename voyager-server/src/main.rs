//! Voyager server entry point.
//!
//! Loads configuration, wires an LLM provider, mock inventory provider, and
//! the read-only Planner capabilities, then serves the `PlanTrip` RPC.

mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use voyager_core::config;
use voyager_core::orchestrator::Orchestrator;
use voyager_core::planner::Planner;
use voyager_core::providers;
use voyager_core::verifier::Verifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let app_config = config::load_config(None, None)?;

    let filter = EnvFilter::try_new(&app_config.logging.filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if app_config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let llm = providers::create_provider(&app_config.llm)?;

    let mut planner = Planner::new(Arc::clone(&llm), app_config.planner.clone())
        .with_location_config(app_config.location.clone());
    planner.register_capability(as_registered_capability(Arc::new(
        voyager_tools::DateCapability::new(),
    )));
    planner.register_capability(as_registered_capability(Arc::new(
        voyager_tools::LocationCapability::new(),
    )));
    planner.register_capability(as_registered_capability(Arc::new(
        voyager_tools::CurrencyCapability::new(),
    )));

    let inventory = Arc::new(voyager_core::inventory::MockInventoryProvider::new());
    let verifier = Verifier::new(
        inventory,
        voyager_tools::capabilities::currency::verifier_currency_lookup(),
        app_config.verifier.clone(),
    );

    let orchestrator = Orchestrator::new(planner, verifier, app_config.orchestrator.clone());

    let shared = state::SharedState::new(orchestrator);
    let app = handlers::router(shared);

    let addr: SocketAddr = "0.0.0.0:8787".parse()?;
    tracing::info!(%addr, "starting voyager-server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Adapt a `voyager_tools::Capability` into a `RegisteredCapability`,
/// isolating `voyager-core` from depending on `voyager-tools`.
fn as_registered_capability(
    capability: Arc<dyn voyager_tools::Capability>,
) -> voyager_core::planner::RegisteredCapability {
    let definition = voyager_core::types::ToolDefinition {
        name: capability.name().to_string(),
        description: capability.description().to_string(),
        parameters: capability.parameters_schema(),
    };
    let executor: voyager_core::planner::CapabilityExecutor = Box::new(move |args| {
        let capability = Arc::clone(&capability);
        Box::pin(async move { capability.execute(args).await.map_err(|e| e.to_string()) })
    });
    voyager_core::planner::RegisteredCapability { definition, executor }
}
