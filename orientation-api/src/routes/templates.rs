/// Task template endpoints
///
/// Same shape as programs: CRUD with soft delete, the four unconditional
/// lifecycle actions, and `GET /api/templates/:id/programs` for the live
/// programs a template is linked to.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{double_option, required_text, AppJson, AppPath, AppQuery, DeletedQuery, PageQuery},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use orientation_shared::{
    auth::{
        authorization::require,
        middleware::AuthContext,
        policy::{Action, Resource},
    },
    models::{
        lifecycle::{LifecycleAction, LifecycleStatus},
        pagination::{Page, Pagination},
        program::Program,
        program_template_link,
        template::{CreateTemplate, Template, TemplateFilter, UpdateTemplate, Visibility},
        user::trim_to_option,
    },
};
use serde::Deserialize;
use uuid::Uuid;

const MAX_LABEL_LENGTH: usize = 255;

/// Query parameters for `GET /api/templates`
#[derive(Debug, Default, Deserialize)]
pub struct TemplateListQuery {
    pub status: Option<LifecycleStatus>,
    pub week: Option<i32>,
    pub q: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub week_number: i32,
    pub label: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub due_offset_days: i32,
    pub required: Option<bool>,
    pub visibility: Option<Visibility>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTemplateRequest {
    pub week_number: Option<i32>,
    pub label: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,

    pub due_offset_days: Option<i32>,
    pub required: Option<bool>,
    pub visibility: Option<Visibility>,
    pub sort_order: Option<i32>,
}

fn check_week_number(week_number: i32) -> ApiResult<()> {
    if week_number < 1 {
        return Err(ApiError::validation("week_number", "week_number must be at least 1"));
    }
    Ok(())
}

fn check_due_offset(due_offset_days: i32) -> ApiResult<()> {
    if due_offset_days < 0 {
        return Err(ApiError::validation(
            "due_offset_days",
            "due_offset_days must not be negative",
        ));
    }
    Ok(())
}

impl CreateTemplateRequest {
    fn into_create(self) -> ApiResult<CreateTemplate> {
        let label = required_text("label", &self.label, MAX_LABEL_LENGTH)?;
        check_week_number(self.week_number)?;
        check_due_offset(self.due_offset_days)?;

        let mut template = CreateTemplate::new(self.week_number, label);
        template.notes = trim_to_option(self.notes);
        template.due_offset_days = self.due_offset_days;
        if let Some(required) = self.required {
            template.required = required;
        }
        if let Some(visibility) = self.visibility {
            template.visibility = visibility;
        }
        if let Some(sort_order) = self.sort_order {
            template.sort_order = sort_order;
        }

        Ok(template)
    }
}

impl UpdateTemplateRequest {
    fn into_update(self) -> ApiResult<UpdateTemplate> {
        let label = self
            .label
            .map(|l| required_text("label", &l, MAX_LABEL_LENGTH))
            .transpose()?;
        if let Some(week_number) = self.week_number {
            check_week_number(week_number)?;
        }
        if let Some(due_offset_days) = self.due_offset_days {
            check_due_offset(due_offset_days)?;
        }

        Ok(UpdateTemplate {
            week_number: self.week_number,
            label,
            notes: self.notes.map(trim_to_option),
            due_offset_days: self.due_offset_days,
            required: self.required,
            visibility: self.visibility,
            sort_order: self.sort_order,
        })
    }
}

pub async fn list_templates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(query): AppQuery<TemplateListQuery>,
    AppQuery(page): AppQuery<PageQuery>,
) -> ApiResult<Json<Page<Template>>> {
    require(&auth, Action::Read, Resource::Templates)?;

    let pagination = Pagination::new(page.limit, page.offset);
    let filter = TemplateFilter {
        status: query.status,
        week: query.week,
        q: query.q,
        include_deleted: query.include_deleted,
    };

    let (templates, total) = Template::list(&state.db, &filter, pagination).await?;

    Ok(Json(Page::new(templates, total, pagination)))
}

pub async fn get_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(template_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<DeletedQuery>,
) -> ApiResult<Json<Template>> {
    require(&auth, Action::Read, Resource::Templates)?;

    let template = Template::find_by_id(&state.db, template_id, query.include_deleted)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;

    Ok(Json(template))
}

/// Creates a template in `draft`
///
/// Defaults: `required = true`, `visibility = public`, `sort_order = 0`,
/// `due_offset_days = 0`.
pub async fn create_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(req): AppJson<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<Template>)> {
    require(&auth, Action::Create, Resource::Templates)?;

    let template = Template::create(&state.db, req.into_create()?).await?;

    tracing::info!(template_id = %template.template_id, created_by = %auth.user_id, "Created template");

    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn update_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(template_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateTemplateRequest>,
) -> ApiResult<Json<Template>> {
    require(&auth, Action::Update, Resource::Templates)?;

    let template = Template::update(&state.db, template_id, req.into_update()?)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;

    Ok(Json(template))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(template_id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    require(&auth, Action::Delete, Resource::Templates)?;

    if !Template::soft_delete(&state.db, template_id).await? {
        return Err(ApiError::not_found("Template"));
    }

    tracing::info!(%template_id, deleted_by = %auth.user_id, "Soft-deleted template");

    Ok(StatusCode::NO_CONTENT)
}

async fn transition(
    state: &AppState,
    auth: &AuthContext,
    template_id: Uuid,
    action: LifecycleAction,
) -> ApiResult<Json<Template>> {
    require(auth, action.policy_action(), Resource::Templates)?;

    let template = Template::apply_lifecycle(&state.db, template_id, action)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;

    Ok(Json(template))
}

pub async fn publish_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(template_id): AppPath<Uuid>,
) -> ApiResult<Json<Template>> {
    transition(&state, &auth, template_id, LifecycleAction::Publish).await
}

pub async fn deprecate_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(template_id): AppPath<Uuid>,
) -> ApiResult<Json<Template>> {
    transition(&state, &auth, template_id, LifecycleAction::Deprecate).await
}

pub async fn archive_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(template_id): AppPath<Uuid>,
) -> ApiResult<Json<Template>> {
    transition(&state, &auth, template_id, LifecycleAction::Archive).await
}

pub async fn restore_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(template_id): AppPath<Uuid>,
) -> ApiResult<Json<Template>> {
    transition(&state, &auth, template_id, LifecycleAction::Restore).await
}

/// Lists the live programs a template is linked to
pub async fn list_template_programs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(template_id): AppPath<Uuid>,
) -> ApiResult<Json<Vec<Program>>> {
    require(&auth, Action::Read, Resource::Templates)?;

    Template::find_by_id(&state.db, template_id, false)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;

    let programs = program_template_link::list_programs_for_template(&state.db, template_id).await?;

    Ok(Json(programs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_defaults() {
        let req: CreateTemplateRequest =
            serde_json::from_str(r#"{"week_number": 2, "label": " Meet your buddy "}"#).unwrap();
        let create = req.into_create().unwrap();

        assert_eq!(create.label, "Meet your buddy");
        assert_eq!(create.week_number, 2);
        assert_eq!(create.due_offset_days, 0);
        assert!(create.required);
        assert_eq!(create.visibility, Visibility::Public);
        assert_eq!(create.sort_order, 0);
    }

    #[test]
    fn test_create_rejects_bad_week_and_offset() {
        let req: CreateTemplateRequest =
            serde_json::from_str(r#"{"week_number": 0, "label": "x"}"#).unwrap();
        assert!(matches!(
            req.into_create(),
            Err(ApiError::ValidationError(ref d)) if d[0].field == "week_number"
        ));

        let req: CreateTemplateRequest =
            serde_json::from_str(r#"{"week_number": 1, "label": "x", "due_offset_days": -1}"#)
                .unwrap();
        assert!(matches!(
            req.into_create(),
            Err(ApiError::ValidationError(ref d)) if d[0].field == "due_offset_days"
        ));
    }

    #[test]
    fn test_update_private_and_clear_notes() {
        let req: UpdateTemplateRequest =
            serde_json::from_str(r#"{"visibility": "private", "notes": ""}"#).unwrap();
        let update = req.into_update().unwrap();

        assert_eq!(update.visibility, Some(Visibility::Private));
        assert_eq!(update.notes, Some(None));
        assert_eq!(update.label, None);
    }
}
