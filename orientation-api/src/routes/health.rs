/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "pool": { "active_connections": 1, "idle_connections": 1, "total_connections": 2 }
/// }
/// ```
///
/// Always answers 200 so load balancers can tell a degraded service from a
/// dead one.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use orientation_shared::db::pool::{get_pool_stats, health_check as db_health_check, PoolStats};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: &'static str,

    pub version: &'static str,

    /// `connected` or `disconnected`
    pub database: &'static str,

    pub pool: PoolStats,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let connected = match db_health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };

    Ok(Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: if connected { "connected" } else { "disconnected" },
        pool: get_pool_stats(&state.db),
    }))
}
