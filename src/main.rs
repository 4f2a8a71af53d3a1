//! CareAgents server
//!
//! Main entry point for the CareAgents backend.

use std::sync::Arc;

use actix_files as fs;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

use careagents::llm::AnthropicClient;
use careagents::orchestrator::Orchestrator;
use careagents::state::AppState;
use careagents::{api, config, db, memory, telemetry, websocket};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = config::load_config().context("failed to load configuration")?;
    telemetry::init(&config.logging);

    // Connect to database
    let database = db::Database::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    // Run migrations
    if config.database.run_migrations {
        database
            .run_migrations()
            .await
            .context("failed to run database migrations")?;
    }

    let sessions = memory::build_store(&config.memory)
        .await
        .context("failed to initialise session memory")?;

    if config.llm.api_key.is_empty() {
        warn!("no language model API key configured; chat requests will fail");
    }
    let model = AnthropicClient::new(&config.llm).context("failed to build model client")?;

    let orchestrator = Orchestrator::new(
        Arc::new(model),
        sessions,
        Arc::new(database.clone()),
        config.agents.clone(),
        config.memory.history_limit,
    );

    // Create app state
    let app_state = web::Data::new(AppState {
        orchestrator: Arc::new(orchestrator),
        patients: Arc::new(database.clone()),
        history: Arc::new(database.clone()),
        websocket: config.websocket.clone(),
        model: config.llm.model.clone(),
        model_configured: !config.llm.api_key.is_empty(),
    });

    let server_config = config.server.clone();
    let bind = (config.server.host.clone(), config.server.port);
    info!(host = %bind.0, port = bind.1, "starting CareAgents server");

    // Start HTTP server
    HttpServer::new(move || {
        let app = App::new()
            .app_data(app_state.clone())
            .wrap(api::middleware::cors(&server_config))
            .wrap(TracingLogger::default())
            // API routes
            .configure(api::configure)
            // WebSocket route
            .service(websocket::websocket_route());

        // Serve a built frontend when configured
        match &server_config.static_dir {
            Some(dir) => app.service(fs::Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind(bind)
    .context("failed to bind server address")?
    .run()
    .await?;

    database.close().await;
    info!("server stopped");
    Ok(())
}
