mod handlers;
mod routes;

use anyhow::Context;
use axum::Router;
use kata_common::config::EngineSettings;
use kata_engine::{Engine, SyntaxValidator};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub validator: SyntaxValidator,
    pub settings: EngineSettings,
}

impl AppState {
    pub fn new(engine: Engine, settings: EngineSettings) -> Self {
        let validator =
            SyntaxValidator::for_engine(&engine).with_timeout(settings.compile_timeout_ms);
        Self {
            engine,
            validator,
            settings,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Kata API booting...");

    let settings = EngineSettings::from_env();
    let engine = Engine::from_settings(&settings).context("Failed to load language configurations")?;
    info!(
        languages = ?engine.config().list_languages(),
        default_timeout_ms = settings.default_timeout_ms,
        "Loaded language configurations"
    );

    let addr = settings.api_addr.clone();
    let state = Arc::new(AppState::new(engine, settings));

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
