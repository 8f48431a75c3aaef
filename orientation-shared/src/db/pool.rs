/// PostgreSQL connection pool
///
/// One `PgPool` is created at startup and shared by every request handler.
/// Timeouts are configured in seconds so they map directly onto environment
/// variables.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pool configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections (`DATABASE_MAX_CONNECTIONS`)
    pub max_connections: u32,

    /// Idle connections kept warm
    pub min_connections: u32,

    /// How long a request waits for a free connection (seconds)
    pub acquire_timeout_seconds: u64,

    /// Idle connections are closed after this many seconds; `None` keeps them
    pub idle_timeout_seconds: Option<u64>,

    /// Connections are recycled after this many seconds; `None` keeps them
    pub max_lifetime_seconds: Option<u64>,
}

impl DatabaseConfig {
    /// Default settings for the given URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    fn pool_options(&self) -> PgPoolOptions {
        let mut options = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_seconds));

        if let Some(idle_timeout) = self.idle_timeout_seconds {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        if let Some(max_lifetime) = self.max_lifetime_seconds {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        options
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
        }
    }
}

/// Connects the pool and verifies the database answers
///
/// # Errors
///
/// Returns an error if the URL is invalid, the server is unreachable or the
/// health check fails.
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Creating database connection pool"
    );

    let pool = config.pool_options().connect(&config.url).await?;

    health_check(&pool).await?;

    info!("Database connection pool ready");
    Ok(pool)
}

/// Builds a pool that connects on first use
///
/// Used where a pool is required but the database may never be touched,
/// such as router tests for unauthenticated requests.
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    config.pool_options().connect_lazy(&config.url)
}

/// Runs `SELECT 1` against the pool
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    let (value,): (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if value != 1 {
        warn!(value, "Database health check returned unexpected value");
        return Err(sqlx::Error::Protocol(
            "Health check returned unexpected value".into(),
        ));
    }

    debug!("Database health check passed");
    Ok(())
}

/// Connection counts for the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub active_connections: usize,
    pub idle_connections: usize,
    pub total_connections: usize,
}

pub fn get_pool_stats(pool: &PgPool) -> PoolStats {
    let size = pool.size();
    let idle = pool.num_idle() as u32;

    PoolStats {
        active_connections: size.saturating_sub(idle) as usize,
        idle_connections: idle as usize,
        total_connections: size as usize,
    }
}

/// Closes all connections; called on shutdown
pub async fn close_pool(pool: PgPool) {
    info!("Closing database connection pool");
    pool.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.acquire_timeout_seconds, 30);
        assert_eq!(config.idle_timeout_seconds, Some(600));
        assert_eq!(config.max_lifetime_seconds, Some(1800));
    }

    #[test]
    fn test_from_url_keeps_defaults() {
        let config = DatabaseConfig::from_url("postgres://localhost/orientation");
        assert_eq!(config.url, "postgres://localhost/orientation");
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_lazy_pool_rejects_invalid_url() {
        let config = DatabaseConfig::from_url("not a database url");
        assert!(create_lazy_pool(&config).is_err());
    }
}
