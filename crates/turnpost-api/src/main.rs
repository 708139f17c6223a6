//! Turnpost API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use turnpost_api::config::AppConfig;
use turnpost_api::state::AppState;
use turnpost_api::telemetry;
use turnpost_core::clock::SystemClock;
use turnpost_core::repository::SessionRepository;
use turnpost_core::rng::SystemRng;
use turnpost_gateway::ToolRegistry;
use turnpost_store::{InMemorySessionRepository, PgSessionRepository};

async fn repository(config: &AppConfig) -> Result<Arc<dyn SessionRepository>, Box<dyn Error>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, sessions are kept in memory only");
        return Ok(Arc::new(InMemorySessionRepository::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    let repository = PgSessionRepository::new(pool);
    repository.ensure_schema().await?;
    Ok(Arc::new(repository))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    let tracer_provider = telemetry::init_tracing(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Turnpost API server");

    let app_state = AppState::new(
        repository(&config).await?,
        Arc::new(SystemClock),
        Arc::new(Mutex::new(SystemRng::from_entropy())),
        ToolRegistry::with_builtin_tools()?,
        config.profiles()?,
    )
    .with_retry_policy(config.retry_policy());

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = turnpost_api::app(app_state).layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("invalid HOST:PORT combination: {e}"))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    if let Some(provider) = tracer_provider {
        provider.shutdown()?;
    }
    Ok(())
}
