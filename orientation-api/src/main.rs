//! # Orientation API Server
//!
//! Serves the orientation admin API over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/orientation \
//! SESSION_SECRET=$(openssl rand -hex 32) \
//! cargo run -p orientation-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs and `RUST_LOG` to change the
//! filter.

use std::net::SocketAddr;

use anyhow::Context;
use orientation_api::{
    app::{build_router, AppState},
    config::Config,
};
use orientation_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "orientation_api=debug,orientation_shared=debug,tower_http=info".into()
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "Orientation API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(DatabaseConfig {
        max_connections: config.database.max_connections,
        ..DatabaseConfig::from_url(config.database.url.clone())
    })
    .await
    .context("Failed to connect to database")?;

    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    let app = build_router(AppState::new(pool.clone(), config));

    tracing::info!("Server listening on http://{}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
