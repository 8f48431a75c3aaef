/// Role and permission introspection
///
/// `GET /rbac/roles` lists what the database grants each role. Requests are
/// authorized against the compiled policy, which the seed migration mirrors;
/// `GET /rbac/me/permissions` reports that policy for the caller.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use orientation_shared::{
    auth::{
        authorization::require,
        middleware::AuthContext,
        policy::{Action, Resource, Role},
    },
    models::role::RoleRecord,
};
use serde::Serialize;
use uuid::Uuid;

/// Caller's roles and effective permissions
#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
    pub permissions: Vec<String>,
}

/// Lists roles with their permission keys (`roles:read`)
pub async fn list_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<RoleRecord>>> {
    require(&auth, Action::Read, Resource::Roles)?;

    let roles = RoleRecord::list_with_permissions(&state.db).await?;

    Ok(Json(roles))
}

pub async fn my_permissions(Extension(auth): Extension<AuthContext>) -> Json<PermissionsResponse> {
    let permissions = auth.permissions();

    Json(PermissionsResponse {
        user_id: auth.user_id,
        roles: auth.roles,
        permissions,
    })
}
