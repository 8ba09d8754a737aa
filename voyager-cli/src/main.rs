//! Voyager CLI — terminal front end for the trip-planning orchestrator.
//!
//! Provides both single-query and interactive REPL modes, mirroring the
//! config/CLI-override pattern of larger agent CLIs but without their
//! approval/TUI machinery, since this orchestrator has nothing to approve.

use clap::Parser;
use std::io::{self, BufRead, Write as _};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use voyager_core::config;
use voyager_core::orchestrator::Orchestrator;
use voyager_core::planner::{Planner, RegisteredCapability};
use voyager_core::providers;
use voyager_core::verifier::Verifier;

/// Voyager: a conversational travel-planning orchestrator
#[derive(Parser, Debug)]
#[command(name = "voyager", version, about, long_about = None)]
struct Cli {
    /// Trip query to plan (starts interactive mode if omitted)
    query: Option<String>,

    /// LLM model to use, overriding configuration
    #[arg(short, long)]
    model: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Print the raw itinerary JSON instead of a human-readable summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let mut app_config = config::load_config(None, None)?;
    if let Some(model) = &cli.model {
        app_config.llm.model = model.clone();
    }

    let llm = providers::create_provider(&app_config.llm)?;
    let mut planner =
        Planner::new(Arc::clone(&llm), app_config.planner.clone()).with_location_config(app_config.location.clone());
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

    if let Some(query) = cli.query {
        run_single_query(&orchestrator, &query, cli.json).await
    } else {
        run_repl(&orchestrator, cli.json).await
    }
}

async fn run_single_query(orchestrator: &Orchestrator, query: &str, json: bool) -> anyhow::Result<()> {
    let cancellation = CancellationToken::new();
    let result = orchestrator
        .orchestrate(query, String::new(), &cancellation)
        .await?;
    print_result(&result, json);
    Ok(())
}

async fn run_repl(orchestrator: &Orchestrator, json: bool) -> anyhow::Result<()> {
    println!("Voyager trip planner. Describe the trip you'd like; Ctrl-D to quit.");
    let stdin = io::stdin();
    let mut history = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        let cancellation = CancellationToken::new();
        match orchestrator.orchestrate(query, history.clone(), &cancellation).await {
            Ok(result) => {
                print_result(&result, json);
                history.push_str(&format!("user: {}\nassistant: {}\n", query, result.text));
            }
            Err(err) => eprintln!("error: {}", err),
        }
    }
    Ok(())
}

fn print_result(result: &voyager_core::orchestrator::OrchestrationResult, json: bool) {
    if json {
        match serde_json::to_string_pretty(&result.itineraries) {
            Ok(body) => println!("{}", body),
            Err(err) => eprintln!("failed to serialize itineraries: {}", err),
        }
        return;
    }

    if result.itineraries.is_empty() {
        println!("{}", result.text);
        return;
    }
    for itinerary in &result.itineraries {
        println!("- {} ({} travelers)", itinerary.title, itinerary.travelers);
        if !itinerary.description.is_empty() {
            println!("  {}", itinerary.description);
        }
        if let Some(error) = &itinerary.error {
            println!("  note: {}", error.message);
        }
    }
}

/// Adapt a `voyager_tools::Capability` into a `RegisteredCapability`,
/// isolating `voyager-core` from depending on `voyager-tools`.
fn as_registered_capability(capability: Arc<dyn voyager_tools::Capability>) -> RegisteredCapability {
    let definition = voyager_core::types::ToolDefinition {
        name: capability.name().to_string(),
        description: capability.description().to_string(),
        parameters: capability.parameters_schema(),
    };
    let executor: voyager_core::planner::CapabilityExecutor = Box::new(move |args| {
        let capability = Arc::clone(&capability);
        Box::pin(async move { capability.execute(args).await.map_err(|e| e.to_string()) })
    });
    RegisteredCapability { definition, executor }
}
