//! CLI entry point (§10.3).
//!
//! Grounded on the teacher's `agentgateway-app/src/main.rs`: a small clap
//! `Args` struct, a current-thread-friendly tokio runtime (here `#[tokio::
//! main]` with the full feature set, since unlike the teacher we have no
//! dedicated data-plane thread pool to hand off to), config load → build →
//! run → exit-code mapping.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use gatehouse::api::handlers;
use gatehouse::api::ApiRegistryBuilder;
use gatehouse::config::Config;
use gatehouse::readiness::Readiness;
use gatehouse::store::Storage;
use gatehouse::telemetry;
use gatehouse::{proxy, signal};

#[derive(Parser, Debug)]
#[command(name = "gatehouse", version, about = "Configuration-driven reverse HTTP proxy")]
struct Args {
	#[arg(long, default_value = "config.toml")]
	config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
	telemetry::init();
	let args = Args::parse();

	match run(args).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!(error = %e, trace = ?telemetry::error_trace(&e), "fatal error");
			ExitCode::FAILURE
		},
	}
}

async fn run(args: Args) -> anyhow::Result<()> {
	let config = Config::load(&args.config)?;
	proxy::ingest::check_no_duplicate_authorities(&config.routes)?;

	let storage = Storage::open(&config.database).await?;
	storage.sync_config_routes(&config.routes).await?;
	let routes = storage.active_routes().await?;

	let mut registry_builder = ApiRegistryBuilder::new();
	registry_builder.register("health", handlers::health)?;
	registry_builder.register("echo_path", handlers::echo_path)?;
	let api_registry = registry_builder.finish();

	let (groups, built_handlers) = proxy::build(&routes, &api_registry)?;

	let readiness = Readiness::new();
	let readiness_for_server = readiness.clone();
	tokio::spawn(async move {
		if let Err(e) = gatehouse::readiness::serve("0.0.0.0:9090", readiness_for_server).await {
			error!(error = %e, "readiness server exited");
		}
	});

	let signal_rx = signal::trigger_on_termination();

	proxy::run(groups, built_handlers, signal_rx, move || readiness.mark_ready()).await
}
