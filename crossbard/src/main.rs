mod config;
mod router;
mod server;
mod shutdown;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crossbar_core::state::InMemoryStateStore;
use crossbar_skills::{
    AnonymousTokens, HttpSkillForwarder, InMemoryConversationIdMapper, SkillRegistry,
    StaticTokens, TokenProvider,
};

use crate::router::{TriggerPhrasePolicy, TurnRouter};

/// Crossbar daemon — root conversation router delegating turns to remote
/// skill agents.
#[derive(Parser, Debug)]
#[command(name = "crossbard", version, about)]
struct Cli {
    /// Config file path.
    #[arg(short, long, default_value = "crossbar.toml")]
    config: PathBuf,

    /// Increase log verbosity (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Validate config and exit.
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 1. Load and validate config
    // -----------------------------------------------------------------------
    let config = config::load_config(&cli.config)?;
    config::validate_config(&config)?;

    if cli.validate {
        println!("config is valid");
        return Ok(());
    }

    // -----------------------------------------------------------------------
    // 2. Initialize tracing / OTEL
    // -----------------------------------------------------------------------
    let telemetry_guard = telemetry::init_telemetry(&config.otel, cli.verbose)?;

    info!(app_id = %config.server.app_id, "crossbard starting");

    // -----------------------------------------------------------------------
    // 3. Wire up the routing core
    // -----------------------------------------------------------------------
    let registry = Arc::new(SkillRegistry::from_config(&config)?);

    let tokens: Arc<dyn TokenProvider> = if config
        .skills
        .values()
        .any(|entry| entry.bearer_token.is_some())
    {
        Arc::new(StaticTokens::from_config(&config.skills))
    } else {
        Arc::new(AnonymousTokens)
    };
    let forwarder = Arc::new(HttpSkillForwarder::new(
        Duration::from_secs(config.forwarding.timeout_secs),
        tokens,
    )?);

    let store = Arc::new(InMemoryStateStore::new());
    let mapper = Arc::new(InMemoryConversationIdMapper::new());
    let policy = TriggerPhrasePolicy::new(&config.routing);

    let turn_router = Arc::new(TurnRouter::new(
        store,
        mapper,
        forwarder,
        registry,
        Box::new(policy),
        &config.server,
    ));

    // -----------------------------------------------------------------------
    // 4. Serve the transport adapter until a shutdown signal arrives
    // -----------------------------------------------------------------------
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(shutdown::signal_listener(shutdown_tx));

    let app = server::http_router(server::AppState::new(turn_router));
    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    info!(bind = %config.server.bind_addr, "transport adapter listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.changed().await.ok();
        })
        .await
        .context("serving transport adapter")?;

    info!("crossbard stopped");
    telemetry_guard.flush();

    Ok(())
}
