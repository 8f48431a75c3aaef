/// The caller's own profile
///
/// - `GET /me`: profile, roles and effective permissions
/// - `PATCH /me`: same profile update rules as `PATCH /api/users/:id`

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{
        users::{apply_profile_update, load_user_view, UpdateProfileRequest, UserView},
        AppJson,
    },
};
use axum::{extract::State, Extension, Json};
use orientation_shared::auth::{middleware::AuthContext, policy::permissions_for};
use serde::Serialize;

/// Current user response
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserView,

    /// Effective `resource:action` keys
    pub permissions: Vec<String>,
}

impl From<UserView> for MeResponse {
    fn from(user: UserView) -> Self {
        let permissions = permissions_for(&user.roles);
        Self { user, permissions }
    }
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let view = load_user_view(&state, auth.user_id).await?;
    Ok(Json(view.into()))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> ApiResult<Json<MeResponse>> {
    let view = apply_profile_update(&state, auth.user_id, req).await?;
    Ok(Json(view.into()))
}
