/// User directory endpoints
///
/// - `GET    /api/users`             list (`users:read`)
/// - `POST   /api/users`             create (`users:create`)
/// - `GET    /api/users/:id`         get (`users:read` or self)
/// - `PATCH  /api/users/:id`         update profile (`users:update` or self)
/// - `PATCH  /api/users/:id/status`  set status (`users:update`)
/// - `PUT    /api/users/:id/roles`   replace roles (`users:assign_roles`)
/// - `DELETE /api/users/:id`         archive (`users:delete`)
///
/// Role changes go through [`check_role_assignment`]: managers may only
/// grant or revoke `viewer` and `trainee`. Profile, status and archive
/// changes on another user go through [`check_user_management`], so the
/// same limit applies to whom a manager may edit.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    routes::{double_option, AppJson, AppPath, AppQuery, PageQuery},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use orientation_shared::{
    auth::{
        authorization::{check_role_assignment, check_user_management, require, require_self_or},
        middleware::AuthContext,
        password,
        policy::{Action, Resource, Role},
    },
    models::{
        pagination::{Page, Pagination},
        role::UserRole,
        user::{trim_to_option, CreateUser, UpdateProfile, User, UserFilter, UserStatus},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

/// User with their roles
#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
}

/// Query parameters for `GET /api/users`
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub status: Option<UserStatus>,
    pub q: Option<String>,
}

/// Create user request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 255, message = "Full name must be 1-255 characters"))]
    pub full_name: String,

    #[validate(length(max = 64, message = "Username must be at most 64 characters"))]
    pub username: Option<String>,

    #[validate(length(max = 255, message = "Organization must be at most 255 characters"))]
    pub organization: Option<String>,

    /// Sets a local password and activates the account
    pub password: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,
}

impl CreateUserRequest {
    fn normalized(self) -> Self {
        Self {
            email: self.email.trim().to_lowercase(),
            full_name: self.full_name.trim().to_string(),
            username: trim_to_option(self.username),
            organization: trim_to_option(self.organization),
            password: self.password.filter(|p| !p.is_empty()),
            roles: self.roles,
        }
    }
}

/// Profile update request, shared by `PATCH /api/users/:id` and `PATCH /me`
///
/// `organization` and `username` accept `null` (or an empty string) to clear
/// the value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub organization: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub username: Option<Option<String>>,
}

/// Status change request
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: UserStatus,
}

/// Role replacement request
#[derive(Debug, Deserialize)]
pub struct ReplaceRolesRequest {
    pub roles: Vec<String>,
}

/// Parses role keys, reporting unknown ones as a 422 on `roles`
pub(crate) fn parse_roles(keys: &[String]) -> ApiResult<Vec<Role>> {
    let mut roles = Vec::with_capacity(keys.len());
    for key in keys {
        let role = key
            .parse::<Role>()
            .map_err(|e| ApiError::validation("roles", e.to_string()))?;
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    roles.sort();
    Ok(roles)
}

/// Normalizes and validates a profile update
pub(crate) fn validated_profile(req: UpdateProfileRequest) -> ApiResult<UpdateProfile> {
    let update = UpdateProfile {
        full_name: req.full_name,
        email: req.email,
        organization: req.organization,
        username: req.username,
    }
    .normalized();

    let mut errors = Vec::new();

    if let Some(full_name) = &update.full_name {
        if full_name.is_empty() {
            errors.push(("full_name", "Full name must not be empty"));
        } else if full_name.chars().count() > 255 {
            errors.push(("full_name", "Full name must be at most 255 characters"));
        }
    }

    if let Some(email) = &update.email {
        if !email.validate_email() {
            errors.push(("email", "Invalid email format"));
        }
    }

    if let Some(Some(username)) = &update.username {
        if username.chars().count() > 64 {
            errors.push(("username", "Username must be at most 64 characters"));
        }
    }

    if errors.is_empty() {
        return Ok(update);
    }

    Err(ApiError::ValidationError(
        errors
            .into_iter()
            .map(|(field, message)| ValidationErrorDetail {
                field: field.to_string(),
                message: message.to_string(),
            })
            .collect(),
    ))
}

/// Loads a user with roles, 404 if missing
pub(crate) async fn load_user_view(state: &AppState, user_id: Uuid) -> ApiResult<UserView> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    let roles = UserRole::roles_for_user(&state.db, user.id).await?;

    Ok(UserView { user, roles })
}

/// Applies a profile update for `user_id`
pub(crate) async fn apply_profile_update(
    state: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> ApiResult<UserView> {
    let update = validated_profile(req)?;

    if !update.is_empty() {
        User::update_profile(&state.db, user_id, update)
            .await?
            .ok_or_else(|| ApiError::not_found("User"))?;
        tracing::debug!(%user_id, "Updated user profile");
    }

    load_user_view(state, user_id).await
}

/// Rejects changes to a user holding a role the caller could not assign
async fn ensure_manageable(state: &AppState, auth: &AuthContext, user_id: Uuid) -> ApiResult<()> {
    let target_roles = UserRole::roles_for_user(&state.db, user_id).await?;
    check_user_management(&auth.roles, &target_roles)?;
    Ok(())
}

/// Lists users with their roles
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(query): AppQuery<UserListQuery>,
    AppQuery(page): AppQuery<PageQuery>,
) -> ApiResult<Json<Page<UserView>>> {
    require(&auth, Action::Read, Resource::Users)?;

    let pagination = Pagination::new(page.limit, page.offset);
    let filter = UserFilter {
        status: query.status,
        q: query.q,
    };

    let (users, total) = User::list(&state.db, &filter, pagination).await?;

    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let mut roles = UserRole::roles_for_users(&state.db, &ids).await?;

    let items = users
        .into_iter()
        .map(|user| {
            let roles = roles.remove(&user.id).unwrap_or_default();
            UserView { user, roles }
        })
        .collect();

    Ok(Json(Page::new(items, total, pagination)))
}

/// Gets one user
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(user_id): AppPath<Uuid>,
) -> ApiResult<Json<UserView>> {
    require_self_or(&auth, user_id, Action::Read, Resource::Users)?;

    Ok(Json(load_user_view(&state, user_id).await?))
}

/// Creates a user
///
/// With a password the account starts `active`, otherwise `pending`.
///
/// # Errors
///
/// - `403`: caller may not create users or grant a requested role
/// - `409`: email or username already taken
/// - `422`: invalid email, empty full name, weak password or unknown role
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(req): AppJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    require(&auth, Action::Create, Resource::Users)?;

    let req = req.normalized();
    req.validate()?;

    let roles = parse_roles(&req.roles)?;
    check_role_assignment(&auth.roles, &[], &roles)?;

    let password_hash = match req.password.as_deref() {
        Some(password) => {
            password::validate_password_strength(password)
                .map_err(|e| ApiError::validation("password", e))?;
            Some(password::hash_password(password)?)
        }
        None => None,
    };

    let status = if password_hash.is_some() {
        UserStatus::Active
    } else {
        UserStatus::Pending
    };

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email: req.email,
            full_name: req.full_name,
            username: req.username,
            organization: req.organization,
            password_hash,
            status,
        },
    )
    .await?;

    UserRole::replace_for_user(&mut tx, user.id, &roles).await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, created_by = %auth.user_id, roles = ?roles, "Created user");

    Ok((StatusCode::CREATED, Json(UserView { user, roles })))
}

/// Updates a user's profile
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserView>> {
    require_self_or(&auth, user_id, Action::Update, Resource::Users)?;
    if user_id != auth.user_id {
        ensure_manageable(&state, &auth, user_id).await?;
    }

    Ok(Json(apply_profile_update(&state, user_id, req).await?))
}

/// Sets a user's account status
pub async fn set_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(req): AppJson<SetStatusRequest>,
) -> ApiResult<Json<UserView>> {
    require(&auth, Action::Update, Resource::Users)?;
    ensure_manageable(&state, &auth, user_id).await?;

    User::set_status(&state.db, user_id, req.status)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    tracing::info!(%user_id, status = req.status.as_str(), changed_by = %auth.user_id, "Changed user status");

    Ok(Json(load_user_view(&state, user_id).await?))
}

/// Replaces a user's roles
///
/// Only roles that change are checked against the caller's assignment
/// rights.
pub async fn replace_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(req): AppJson<ReplaceRolesRequest>,
) -> ApiResult<Json<UserView>> {
    require(&auth, Action::AssignRoles, Resource::Users)?;

    let requested = parse_roles(&req.roles)?;

    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let mut tx = state.db.begin().await?;

    let current = UserRole::roles_for_user(&mut *tx, user_id).await?;
    check_role_assignment(&auth.roles, &current, &requested)?;

    UserRole::replace_for_user(&mut tx, user_id, &requested).await?;

    tx.commit().await?;

    tracing::info!(
        %user_id,
        from = ?current,
        to = ?requested,
        changed_by = %auth.user_id,
        "Replaced user roles"
    );

    Ok(Json(UserView {
        user,
        roles: requested,
    }))
}

/// Archives a user
///
/// Users are never hard-deleted; their history stays in tasks and the audit
/// log.
pub async fn archive_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(user_id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    require(&auth, Action::Delete, Resource::Users)?;
    ensure_manageable(&state, &auth, user_id).await?;

    User::set_status(&state.db, user_id, UserStatus::Archived)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    tracing::info!(%user_id, archived_by = %auth.user_id, "Archived user");

    Ok(StatusCode::NO_CONTENT)
}
