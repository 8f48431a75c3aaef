/// Request authentication
///
/// Turns a bearer token into an [`AuthContext`]. The token only carries the
/// user id; the user's status and roles are loaded from the database on every
/// request so that suspensions and role changes take effect immediately.
///
/// # Example
///
/// ```no_run
/// use orientation_shared::auth::middleware::{authenticate_bearer, AuthContext};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let auth: AuthContext = authenticate_bearer(&pool, "Bearer eyJ...", "secret").await?;
/// println!("{} has roles {:?}", auth.user_id, auth.roles);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use super::policy::{self, Action, Resource, Role};
use crate::models::role::UserRole;
use crate::models::user::{User, UserStatus};

/// Authentication context added to request extensions
///
/// Handlers extract it with Axum's `Extension` extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Roles held by the user at request time
    pub roles: Vec<Role>,
}

impl AuthContext {
    pub fn new(user_id: Uuid, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    /// Checks the builtin policy for this caller
    pub fn can(&self, action: Action, resource: Resource) -> bool {
        policy::can(&self.roles, action, resource)
    }

    /// Effective `resource:action` permission keys
    pub fn permissions(&self) -> Vec<String> {
        policy::permissions_for(&self.roles)
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Invalid authorization header format
    #[error("{0}")]
    InvalidFormat(String),

    /// Token validation failed
    #[error("{0}")]
    InvalidToken(String),

    /// User no longer exists or is not active
    #[error("{0}")]
    InactiveUser(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value
pub fn parse_bearer(header_value: &str) -> Result<&str, AuthError> {
    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Validates an access token and loads the caller's context
///
/// # Errors
///
/// - `InvalidToken` if the token is malformed, expired or not an access token
/// - `InactiveUser` if the user is missing or not `active`
/// - `DatabaseError` if the lookup fails
pub async fn authenticate(pool: &PgPool, token: &str, secret: &str) -> Result<AuthContext, AuthError> {
    let claims = validate_access_token(token, secret)?;

    let user = User::find_by_id(pool, claims.sub)
        .await?
        .ok_or_else(|| AuthError::InactiveUser("User no longer exists".to_string()))?;

    if user.status != UserStatus::Active {
        tracing::warn!(user_id = %user.id, status = user.status.as_str(), "Rejected token for inactive user");
        return Err(AuthError::InactiveUser(format!(
            "User account is {}",
            user.status.as_str()
        )));
    }

    let roles = UserRole::roles_for_user(pool, user.id).await?;

    Ok(AuthContext::new(user.id, roles))
}

/// [`authenticate`] for a raw `Authorization` header value
pub async fn authenticate_bearer(
    pool: &PgPool,
    header_value: &str,
    secret: &str,
) -> Result<AuthContext, AuthError> {
    let token = parse_bearer(header_value)?;
    authenticate(pool, token, secret).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def").unwrap(), "abc.def");
        assert!(matches!(
            parse_bearer("Basic abc"),
            Err(AuthError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_bearer("Bearer   "),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[test]
    fn test_auth_context_permissions() {
        let auth = AuthContext::new(Uuid::new_v4(), vec![Role::Viewer]);

        assert!(auth.can(Action::Read, Resource::Programs));
        assert!(!auth.can(Action::Create, Resource::Programs));
        assert!(auth.permissions().contains(&"tasks:read".to_string()));
    }

    #[test]
    fn test_jwt_error_maps_to_invalid_token() {
        let err: AuthError = JwtError::Expired.into();
        assert!(matches!(err, AuthError::InvalidToken(msg) if msg == "Token expired"));
    }
}
