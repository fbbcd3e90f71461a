use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use vertex_gateway::config::{Cli, Config};
use vertex_gateway::server::openai_api::{build_router, AppState};
use vertex_gateway::vertex::client::VertexClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "vertex_gateway=debug,tower_http=debug"
    } else {
        "vertex_gateway=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("vertex-gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration, then environment and CLI overrides.
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env();
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    let config = Arc::new(config);

    info!(
        project = %config.vertex.project_id,
        location = %config.vertex.location,
        endpoint = %config.vertex.endpoint(),
        auth = config.server.api_key.is_some(),
        "Configuration loaded"
    );

    info!(
        chat_aliases = config.models.chat.len(),
        embedding_aliases = config.models.embeddings.len(),
        sentence_buffering = config.streaming.sentence_buffering,
        "Model catalog"
    );

    // Upstream client.
    let client = VertexClient::from_config(&config.vertex, &config.server)
        .context("creating Vertex AI client")?;

    // Build application state.
    let state = AppState::new(Arc::new(client), config.clone())
        .map_err(|e| anyhow::anyhow!("registering metrics: {e}"))?;
    let state = Arc::new(state);

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = %listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
