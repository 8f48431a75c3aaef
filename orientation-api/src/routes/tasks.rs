/// Orientation task endpoints
///
/// - `GET   /api/tasks`      list (`user_id`, `program_id`, `week`, `done`)
/// - `GET   /api/tasks/:id`
/// - `PATCH /api/tasks/:id`  toggle `done`, edit `notes` and dates
///
/// Callers without `users:read` only see their own tasks, and callers
/// without `users:update` only edit their own.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{double_option, AppJson, AppPath, AppQuery, PageQuery},
};
use axum::{extract::State, Extension, Json};
use chrono::NaiveDate;
use orientation_shared::{
    auth::{
        authorization::{edits_all_tasks, require, require_ownership, sees_all_tasks, AuthzError},
        middleware::AuthContext,
        policy::{Action, Resource},
    },
    models::{
        pagination::{Page, Pagination},
        task::{OrientationTask, TaskFilter, UpdateTask},
        user::trim_to_option,
    },
};
use serde::Deserialize;
use uuid::Uuid;

/// Query parameters for `GET /api/tasks`
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub user_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub week: Option<i32>,
    pub done: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub done: Option<bool>,

    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_for: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

/// Restricts a list filter to what the caller may see
///
/// Without `users:read` the filter is pinned to the caller; asking for
/// someone else's tasks is a 403.
fn scoped_filter(auth: &AuthContext, query: TaskListQuery) -> Result<TaskFilter, AuthzError> {
    let user_id = if sees_all_tasks(auth) {
        query.user_id
    } else {
        match query.user_id {
            Some(user_id) if user_id != auth.user_id => return Err(AuthzError::NotAuthorized),
            _ => Some(auth.user_id),
        }
    };

    Ok(TaskFilter {
        user_id,
        program_id: query.program_id,
        week: query.week,
        done: query.done,
    })
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(query): AppQuery<TaskListQuery>,
    AppQuery(page): AppQuery<PageQuery>,
) -> ApiResult<Json<Page<OrientationTask>>> {
    require(&auth, Action::Read, Resource::Tasks)?;

    let filter = scoped_filter(&auth, query)?;
    let pagination = Pagination::new(page.limit, page.offset);

    let (tasks, total) = OrientationTask::list(&state.db, &filter, pagination).await?;

    Ok(Json(Page::new(tasks, total, pagination)))
}

/// Gets one task; other users' tasks are 404 for callers who cannot see them
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(task_id): AppPath<Uuid>,
) -> ApiResult<Json<OrientationTask>> {
    require(&auth, Action::Read, Resource::Tasks)?;

    let task = OrientationTask::find_by_id(&state.db, task_id)
        .await?
        .filter(|task| task.user_id == auth.user_id || sees_all_tasks(&auth))
        .ok_or_else(|| ApiError::not_found("Task"))?;

    Ok(Json(task))
}

/// Updates a task
///
/// `done: true` stamps `completed_at` (kept if already set), `done: false`
/// clears it. `notes`, `scheduled_for` and `due_date` accept `null`.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(task_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateTaskRequest>,
) -> ApiResult<Json<OrientationTask>> {
    require(&auth, Action::Update, Resource::Tasks)?;

    let task = OrientationTask::find_by_id(&state.db, task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    if !edits_all_tasks(&auth) {
        require_ownership(&auth, task.user_id)?;
    }

    let update = UpdateTask {
        done: req.done,
        notes: req.notes.map(trim_to_option),
        scheduled_for: req.scheduled_for,
        due_date: req.due_date,
    };

    let task = OrientationTask::update(&state.db, task_id, update)
        .await?
        .ok_or_else(|| ApiError::not_found("Task"))?;

    if let Some(done) = req.done {
        tracing::info!(%task_id, user_id = %task.user_id, done, changed_by = %auth.user_id, "Task completion changed");
    }

    Ok(Json(task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orientation_shared::auth::policy::Role;

    #[test]
    fn test_trainee_filter_is_pinned_to_self() {
        let trainee = AuthContext::new(Uuid::new_v4(), vec![Role::Trainee]);

        let filter = scoped_filter(&trainee, TaskListQuery::default()).unwrap();
        assert_eq!(filter.user_id, Some(trainee.user_id));

        let own = TaskListQuery {
            user_id: Some(trainee.user_id),
            ..Default::default()
        };
        assert_eq!(scoped_filter(&trainee, own).unwrap().user_id, Some(trainee.user_id));

        let other = TaskListQuery {
            user_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert_eq!(scoped_filter(&trainee, other).unwrap_err(), AuthzError::NotAuthorized);
    }

    #[test]
    fn test_manager_filter_is_open() {
        let manager = AuthContext::new(Uuid::new_v4(), vec![Role::Manager]);
        let member = Uuid::new_v4();

        let all = scoped_filter(&manager, TaskListQuery::default()).unwrap();
        assert_eq!(all.user_id, None);

        let one = scoped_filter(
            &manager,
            TaskListQuery {
                user_id: Some(member),
                done: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(one.user_id, Some(member));
        assert_eq!(one.done, Some(false));
    }

    #[test]
    fn test_update_request_distinguishes_null_dates() {
        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"done": true, "due_date": null, "scheduled_for": "2025-03-10"}"#)
                .unwrap();

        assert_eq!(req.done, Some(true));
        assert_eq!(req.due_date, Some(None));
        assert_eq!(req.scheduled_for, Some(NaiveDate::from_ymd_opt(2025, 3, 10)));
        assert_eq!(req.notes, None);
    }
}
