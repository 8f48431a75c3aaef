/// Program task template model and database operations
///
/// A template is a reusable task definition ("Set up your laptop", week 1)
/// that can be linked to any number of programs. Members of a program get an
/// orientation task per linked, published template.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE program_task_templates (
///     template_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     week_number INTEGER NOT NULL CHECK (week_number >= 1),
///     label VARCHAR(255) NOT NULL,
///     notes TEXT,
///     due_offset_days INTEGER NOT NULL DEFAULT 0 CHECK (due_offset_days >= 0),
///     required BOOLEAN NOT NULL DEFAULT TRUE,
///     visibility template_visibility NOT NULL DEFAULT 'public',
///     sort_order INTEGER NOT NULL DEFAULT 0,
///     status lifecycle_status NOT NULL DEFAULT 'draft',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::lifecycle::{LifecycleAction, LifecycleStatus};
use super::pagination::{search_pattern, Pagination};

pub(crate) const TEMPLATE_COLUMNS: &str = "template_id, week_number, label, notes, due_offset_days, \
     required, visibility, sort_order, status, created_at, updated_at, deleted_at";

/// Who can see a template's tasks in shared views
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "template_visibility", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Task template
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Template {
    pub template_id: Uuid,

    /// Program week the task belongs to, starting at 1
    pub week_number: i32,

    pub label: String,
    pub notes: Option<String>,

    /// Days after the scheduled date the task is due
    pub due_offset_days: i32,

    pub required: bool,

    pub visibility: Visibility,

    /// Ordering within a week
    pub sort_order: i32,

    pub status: LifecycleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub week_number: i32,
    pub label: String,
    pub notes: Option<String>,
    pub due_offset_days: i32,
    pub required: bool,
    pub visibility: Visibility,
    pub sort_order: i32,
}

impl CreateTemplate {
    /// A required, public template with no offset
    pub fn new(week_number: i32, label: impl Into<String>) -> Self {
        Self {
            week_number,
            label: label.into(),
            notes: None,
            due_offset_days: 0,
            required: true,
            visibility: Visibility::Public,
            sort_order: 0,
        }
    }
}

/// Template changes; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTemplate {
    pub week_number: Option<i32>,
    pub label: Option<String>,
    pub notes: Option<Option<String>>,
    pub due_offset_days: Option<i32>,
    pub required: Option<bool>,
    pub visibility: Option<Visibility>,
    pub sort_order: Option<i32>,
}

/// Filters for [`Template::list`]
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub status: Option<LifecycleStatus>,
    pub week: Option<i32>,

    /// Substring match on label and notes
    pub q: Option<String>,

    pub include_deleted: bool,
}

impl TemplateFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");

        if !self.include_deleted {
            qb.push(" AND deleted_at IS NULL");
        }

        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status);
        }

        if let Some(week) = self.week {
            qb.push(" AND week_number = ").push_bind(week);
        }

        if let Some(pattern) = search_pattern(self.q.as_deref()) {
            qb.push(" AND (label ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR notes ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

impl Template {
    /// Creates a template in `draft`
    pub async fn create<'e, E>(executor: E, data: CreateTemplate) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO program_task_templates
                 (week_number, label, notes, due_offset_days, required, visibility, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {TEMPLATE_COLUMNS}"
        );

        let template = sqlx::query_as::<_, Template>(&query)
            .bind(data.week_number)
            .bind(data.label.trim())
            .bind(data.notes)
            .bind(data.due_offset_days)
            .bind(data.required)
            .bind(data.visibility)
            .bind(data.sort_order)
            .fetch_one(executor)
            .await?;

        tracing::debug!(template_id = %template.template_id, "Created template");

        Ok(template)
    }

    /// Finds a template by ID
    pub async fn find_by_id<'e, E>(
        executor: E,
        template_id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM program_task_templates
             WHERE template_id = $1 AND ($2 OR deleted_at IS NULL)"
        );

        sqlx::query_as::<_, Template>(&query)
            .bind(template_id)
            .bind(include_deleted)
            .fetch_optional(executor)
            .await
    }

    /// Lists templates ordered by week, sort order and label
    pub async fn list(
        pool: &PgPool,
        filter: &TemplateFilter,
        page: Pagination,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM program_task_templates");
        filter.push_where(&mut count);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TEMPLATE_COLUMNS} FROM program_task_templates"
        ));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY week_number, sort_order, label, template_id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let templates = qb.build_query_as::<Template>().fetch_all(pool).await?;

        Ok((templates, total))
    }

    /// Applies changes to a live template
    pub async fn update(
        pool: &PgPool,
        template_id: Uuid,
        data: UpdateTemplate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb =
            QueryBuilder::<Postgres>::new("UPDATE program_task_templates SET updated_at = NOW()");

        if let Some(week_number) = data.week_number {
            qb.push(", week_number = ").push_bind(week_number);
        }
        if let Some(label) = data.label {
            qb.push(", label = ").push_bind(label);
        }
        if let Some(notes) = data.notes {
            qb.push(", notes = ").push_bind(notes);
        }
        if let Some(due_offset_days) = data.due_offset_days {
            qb.push(", due_offset_days = ").push_bind(due_offset_days);
        }
        if let Some(required) = data.required {
            qb.push(", required = ").push_bind(required);
        }
        if let Some(visibility) = data.visibility {
            qb.push(", visibility = ").push_bind(visibility);
        }
        if let Some(sort_order) = data.sort_order {
            qb.push(", sort_order = ").push_bind(sort_order);
        }

        qb.push(" WHERE template_id = ")
            .push_bind(template_id)
            .push(" AND deleted_at IS NULL")
            .push(format!(" RETURNING {TEMPLATE_COLUMNS}"));

        qb.build_query_as::<Template>().fetch_optional(pool).await
    }

    /// Soft-deletes a template
    pub async fn soft_delete(pool: &PgPool, template_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE program_task_templates SET deleted_at = NOW(), updated_at = NOW()
             WHERE template_id = $1 AND deleted_at IS NULL",
        )
        .bind(template_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Writes the status for a lifecycle action, regardless of the current one
    pub async fn apply_lifecycle(
        pool: &PgPool,
        template_id: Uuid,
        action: LifecycleAction,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE program_task_templates
             SET status = $2,
                 deleted_at = CASE WHEN $3 THEN NULL ELSE deleted_at END,
                 updated_at = NOW()
             WHERE template_id = $1 AND ($3 OR deleted_at IS NULL)
             RETURNING {TEMPLATE_COLUMNS}"
        );

        let template = sqlx::query_as::<_, Template>(&query)
            .bind(template_id)
            .bind(action.target_status())
            .bind(action.clears_soft_delete())
            .fetch_optional(pool)
            .await?;

        if let Some(template) = &template {
            tracing::info!(
                template_id = %template.template_id,
                action = action.as_str(),
                status = template.status.as_str(),
                "Template lifecycle change"
            );
        }

        Ok(template)
    }
}
