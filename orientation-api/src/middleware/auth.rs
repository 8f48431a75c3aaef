/// Bearer token authentication
///
/// Validates the `Authorization: Bearer <token>` header, loads the user and
/// their current roles, and inserts an [`AuthContext`] into the request
/// extensions. Handlers read it with `Extension<AuthContext>`.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use orientation_shared::auth::middleware::{authenticate_bearer, AuthContext};

use crate::{app::AppState, error::ApiError};

/// Rejects the request with 401 unless it carries a valid access token for
/// an active user
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let auth: AuthContext = authenticate_bearer(&state.db, header, state.jwt_secret()).await?;

    tracing::debug!(user_id = %auth.user_id, roles = ?auth.roles, "Authenticated request");

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
