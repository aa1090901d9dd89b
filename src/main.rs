//! Partner Session Service - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Start the optional periodic expiry sweeper
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

use std::{net::SocketAddr, sync::Arc, time::Duration};

use partner_session::{
    app::{self, AppState},
    clock::SystemClock,
    config::Config,
    db,
    services::session_service::{SessionService, run_expiry_sweeper},
    store::PgAccessStore,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let service = SessionService::new(PgAccessStore::new(pool), Arc::new(SystemClock));
    let state = AppState::new(service);

    // Expiry is enforced lazily on every request; the sweeper only tidies
    // rows that nobody is asking about
    if let Some(secs) = config.expiry_sweep_interval_secs.filter(|secs| *secs > 0) {
        tokio::spawn(run_expiry_sweeper(
            Arc::clone(&state.service),
            Duration::from_secs(secs),
        ));
        tracing::info!(interval_secs = secs, "Periodic expiry sweep enabled");
    }

    let app = app::router(state, &config);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer addresses back the requester middleware when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
