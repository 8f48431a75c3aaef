/// Program endpoints
///
/// # CRUD
///
/// - `GET    /api/programs`       list (`status`, `q`, `include_deleted`)
/// - `POST   /api/programs`       create, starts in `draft`
/// - `GET    /api/programs/:id`   get (`include_deleted` to see soft-deleted rows)
/// - `PATCH  /api/programs/:id`   update a live program
/// - `DELETE /api/programs/:id`   soft delete
///
/// # Lifecycle
///
/// `POST /api/programs/:id/{publish,deprecate,archive,restore}` writes the
/// target status whatever the current one is. The RBAC action of the same
/// name is the only gate.
///
/// # Templates and members
///
/// - `GET    /api/programs/:id/templates`
/// - `POST   /api/programs/:id/templates/:template_id` attach (idempotent)
/// - `DELETE /api/programs/:id/templates/:template_id` detach (idempotent)
/// - `GET    /api/programs/:id/members`
/// - `POST   /api/programs/:id/members` assign and instantiate tasks
/// - `DELETE /api/programs/:id/members/:user_id`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{double_option, required_text, AppJson, AppPath, AppQuery, DeletedQuery, PageQuery},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::NaiveDate;
use orientation_shared::{
    auth::{
        authorization::require,
        middleware::AuthContext,
        policy::{Action, Resource},
    },
    models::{
        lifecycle::{LifecycleAction, LifecycleStatus},
        membership::{Assignment, Member, Membership},
        pagination::{Page, Pagination},
        program::{CreateProgram, Program, ProgramFilter, UpdateProgram, MAX_TOTAL_WEEKS},
        program_template_link::{self, AttachOutcome, LinkedTemplate, LinkedTemplateFilter},
        user::{trim_to_option, User},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_TITLE_LENGTH: usize = 255;

/// Query parameters for `GET /api/programs`
#[derive(Debug, Default, Deserialize)]
pub struct ProgramListQuery {
    pub status: Option<LifecycleStatus>,
    pub q: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

/// Query parameters for `GET /api/programs/:id/templates`
#[derive(Debug, Default, Deserialize)]
pub struct LinkedTemplateQuery {
    pub status: Option<LifecycleStatus>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateProgramRequest {
    pub title: String,
    pub description: Option<String>,
    pub total_weeks: i32,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProgramRequest {
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub total_weeks: Option<i32>,

    #[serde(default, deserialize_with = "double_option")]
    pub owner_id: Option<Option<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignMemberRequest {
    pub user_id: Uuid,

    /// Defaults to today
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct AttachResponse {
    pub program_id: Uuid,
    pub template_id: Uuid,

    /// False when the link already existed
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct DetachResponse {
    pub program_id: Uuid,
    pub template_id: Uuid,

    /// False when there was no link to remove
    pub removed: bool,
}

#[derive(Debug, Serialize)]
pub struct RemoveMemberResponse {
    pub program_id: Uuid,
    pub user_id: Uuid,

    /// Open tasks deleted with the membership
    pub tasks_deleted: u64,
}

fn check_total_weeks(total_weeks: i32) -> ApiResult<()> {
    if !(1..=MAX_TOTAL_WEEKS).contains(&total_weeks) {
        return Err(ApiError::validation(
            "total_weeks",
            format!("total_weeks must be between 1 and {}", MAX_TOTAL_WEEKS),
        ));
    }
    Ok(())
}

impl CreateProgramRequest {
    fn into_create(self) -> ApiResult<CreateProgram> {
        let title = required_text("title", &self.title, MAX_TITLE_LENGTH)?;
        check_total_weeks(self.total_weeks)?;

        Ok(CreateProgram {
            title,
            description: trim_to_option(self.description),
            total_weeks: self.total_weeks,
            owner_id: self.owner_id,
        })
    }
}

impl UpdateProgramRequest {
    fn into_update(self) -> ApiResult<UpdateProgram> {
        let title = self
            .title
            .map(|t| required_text("title", &t, MAX_TITLE_LENGTH))
            .transpose()?;

        if let Some(total_weeks) = self.total_weeks {
            check_total_weeks(total_weeks)?;
        }

        Ok(UpdateProgram {
            title,
            description: self.description.map(trim_to_option),
            total_weeks: self.total_weeks,
            owner_id: self.owner_id,
        })
    }
}

/// Loads a live program or fails with 404
async fn live_program(state: &AppState, program_id: Uuid) -> ApiResult<Program> {
    Program::find_by_id(&state.db, program_id, false)
        .await?
        .ok_or_else(|| ApiError::not_found("Program"))
}

pub async fn list_programs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(query): AppQuery<ProgramListQuery>,
    AppQuery(page): AppQuery<PageQuery>,
) -> ApiResult<Json<Page<Program>>> {
    require(&auth, Action::Read, Resource::Programs)?;

    let pagination = Pagination::new(page.limit, page.offset);
    let filter = ProgramFilter {
        status: query.status,
        q: query.q,
        include_deleted: query.include_deleted,
    };

    let (programs, total) = Program::list(&state.db, &filter, pagination).await?;

    Ok(Json(Page::new(programs, total, pagination)))
}

pub async fn get_program(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<DeletedQuery>,
) -> ApiResult<Json<Program>> {
    require(&auth, Action::Read, Resource::Programs)?;

    let program = Program::find_by_id(&state.db, program_id, query.include_deleted)
        .await?
        .ok_or_else(|| ApiError::not_found("Program"))?;

    Ok(Json(program))
}

/// Creates a program
///
/// # Errors
///
/// - `422`: blank title or `total_weeks` outside 1..=52
/// - `404`: `owner_id` does not reference a user
pub async fn create_program(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(req): AppJson<CreateProgramRequest>,
) -> ApiResult<(StatusCode, Json<Program>)> {
    require(&auth, Action::Create, Resource::Programs)?;

    let program = Program::create(&state.db, req.into_create()?).await?;

    tracing::info!(program_id = %program.program_id, created_by = %auth.user_id, "Created program");

    Ok((StatusCode::CREATED, Json(program)))
}

pub async fn update_program(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateProgramRequest>,
) -> ApiResult<Json<Program>> {
    require(&auth, Action::Update, Resource::Programs)?;

    let program = Program::update(&state.db, program_id, req.into_update()?)
        .await?
        .ok_or_else(|| ApiError::not_found("Program"))?;

    Ok(Json(program))
}

/// Soft-deletes a program; `restore` brings it back
pub async fn delete_program(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    require(&auth, Action::Delete, Resource::Programs)?;

    if !Program::soft_delete(&state.db, program_id).await? {
        return Err(ApiError::not_found("Program"));
    }

    tracing::info!(%program_id, deleted_by = %auth.user_id, "Soft-deleted program");

    Ok(StatusCode::NO_CONTENT)
}

async fn transition(
    state: &AppState,
    auth: &AuthContext,
    program_id: Uuid,
    action: LifecycleAction,
) -> ApiResult<Json<Program>> {
    require(auth, action.policy_action(), Resource::Programs)?;

    let program = Program::apply_lifecycle(&state.db, program_id, action)
        .await?
        .ok_or_else(|| ApiError::not_found("Program"))?;

    Ok(Json(program))
}

pub async fn publish_program(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
) -> ApiResult<Json<Program>> {
    transition(&state, &auth, program_id, LifecycleAction::Publish).await
}

pub async fn deprecate_program(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
) -> ApiResult<Json<Program>> {
    transition(&state, &auth, program_id, LifecycleAction::Deprecate).await
}

pub async fn archive_program(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
) -> ApiResult<Json<Program>> {
    transition(&state, &auth, program_id, LifecycleAction::Archive).await
}

pub async fn restore_program(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
) -> ApiResult<Json<Program>> {
    transition(&state, &auth, program_id, LifecycleAction::Restore).await
}

/// Lists the templates linked to a live program
pub async fn list_program_templates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<LinkedTemplateQuery>,
    AppQuery(page): AppQuery<PageQuery>,
) -> ApiResult<Json<Page<LinkedTemplate>>> {
    require(&auth, Action::Read, Resource::Templates)?;

    live_program(&state, program_id).await?;

    let pagination = Pagination::new(page.limit, page.offset);
    let filter = LinkedTemplateFilter {
        status: query.status,
        include_deleted: query.include_deleted,
    };

    let (templates, total) =
        program_template_link::list_templates_for_program(&state.db, program_id, &filter, pagination)
            .await?;

    Ok(Json(Page::new(templates, total, pagination)))
}

/// Links a template to a program
///
/// Answers 201 when a link was written and 200 when it already existed.
pub async fn attach_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath((program_id, template_id)): AppPath<(Uuid, Uuid)>,
) -> ApiResult<(StatusCode, Json<AttachResponse>)> {
    require(&auth, Action::Link, Resource::Templates)?;

    let status = match program_template_link::attach(&state.db, template_id, program_id).await? {
        AttachOutcome::Created => StatusCode::CREATED,
        AttachOutcome::AlreadyLinked => StatusCode::OK,
        AttachOutcome::NotFound => {
            return Err(ApiError::NotFound(
                "Program or template not found".to_string(),
            ))
        }
    };

    Ok((
        status,
        Json(AttachResponse {
            program_id,
            template_id,
            created: status == StatusCode::CREATED,
        }),
    ))
}

pub async fn detach_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath((program_id, template_id)): AppPath<(Uuid, Uuid)>,
) -> ApiResult<Json<DetachResponse>> {
    require(&auth, Action::Link, Resource::Templates)?;

    let removed = program_template_link::detach(&state.db, template_id, program_id).await?;

    Ok(Json(DetachResponse {
        program_id,
        template_id,
        removed,
    }))
}

/// Lists a program's members
///
/// Member rows expose email addresses, so this needs `users:read`.
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
    AppQuery(page): AppQuery<PageQuery>,
) -> ApiResult<Json<Page<Member>>> {
    require(&auth, Action::Read, Resource::Users)?;

    live_program(&state, program_id).await?;

    let pagination = Pagination::new(page.limit, page.offset);
    let (members, total) = Membership::list_members(&state.db, program_id, pagination).await?;

    Ok(Json(Page::new(members, total, pagination)))
}

/// Assigns a user to a program
///
/// Creates one task per linked template that is published and not
/// soft-deleted. Re-assigning keeps the original start date and only fills
/// in missing tasks.
pub async fn assign_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(program_id): AppPath<Uuid>,
    AppJson(req): AppJson<AssignMemberRequest>,
) -> ApiResult<Json<Assignment>> {
    require(&auth, Action::Assign, Resource::Programs)?;

    live_program(&state, program_id).await?;

    User::find_by_id(&state.db, req.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let assignment =
        Membership::assign(&state.db, program_id, req.user_id, req.start_date).await?;

    Ok(Json(assignment))
}

/// Removes a member together with their open tasks in the program
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath((program_id, user_id)): AppPath<(Uuid, Uuid)>,
) -> ApiResult<Json<RemoveMemberResponse>> {
    require(&auth, Action::Assign, Resource::Programs)?;

    let tasks_deleted = Membership::remove(&state.db, program_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Membership"))?;

    tracing::info!(%program_id, %user_id, tasks_deleted, removed_by = %auth.user_id, "Removed program member");

    Ok(Json(RemoveMemberResponse {
        program_id,
        user_id,
        tasks_deleted,
    }))
}
