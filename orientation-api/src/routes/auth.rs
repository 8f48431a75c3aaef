/// Authentication endpoints
///
/// - `POST /auth/login`: exchange email and password for a token pair
/// - `POST /auth/refresh`: exchange a refresh token for a new access token
///
/// Only local accounts with a password hash can log in here. Accounts
/// provisioned through an OAuth provider have no hash and are rejected like
/// a wrong password.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::client_ip::ClientIp,
    routes::AppJson,
};
use axum::{extract::State, Extension, Json};
use orientation_shared::{
    auth::{jwt, password},
    models::user::{User, UserStatus},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Access token lifetime reported to clients
const ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token response for login and refresh
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub user_id: Uuid,
    pub access_token: String,

    /// Only returned by login
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl TokenResponse {
    fn new(user_id: Uuid, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            user_id,
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: ACCESS_TOKEN_TTL_SECONDS,
        }
    }
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid email or password".to_string())
}

fn ensure_active(user: &User) -> ApiResult<()> {
    if user.status != UserStatus::Active {
        return Err(ApiError::Unauthorized(format!(
            "User account is {}",
            user.status.as_str()
        )));
    }
    Ok(())
}

/// Login endpoint
///
/// ```text
/// POST /auth/login
/// { "email": "new.hire@example.com", "password": "Welcome-2025" }
/// ```
///
/// # Errors
///
/// - `422`: malformed email or empty password
/// - `401`: unknown email, wrong password, no local password or inactive account
pub async fn login(
    State(state): State<AppState>,
    Extension(client_ip): Extension<ClientIp>,
    AppJson(req): AppJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let Some(hash) = user.password_hash.as_deref() else {
        return Err(invalid_credentials());
    };

    if !password::verify_password(&req.password, hash)? {
        tracing::warn!(user_id = %user.id, client_ip = ?client_ip.0, "Failed login attempt");
        return Err(invalid_credentials());
    }

    ensure_active(&user)?;

    User::update_last_login(&state.db, user.id).await?;

    let tokens = jwt::issue_pair(user.id, state.jwt_secret())?;

    tracing::info!(user_id = %user.id, client_ip = ?client_ip.0, "User logged in");

    Ok(Json(TokenResponse::new(
        user.id,
        tokens.access_token,
        Some(tokens.refresh_token),
    )))
}

/// Token refresh endpoint
///
/// The user must still exist and be active.
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    ensure_active(&user)?;

    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(TokenResponse::new(user.id, access_token, None)))
}
