/// Links between programs and task templates
///
/// `program_template_links` is a pure join table keyed by
/// `(template_id, program_id)`. Attaching and detaching are idempotent: a
/// repeated attach leaves the existing row alone and a repeated detach is a
/// no-op.
///
/// # Example
///
/// ```no_run
/// use orientation_shared::models::program_template_link::{attach, detach, AttachOutcome};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, program_id: Uuid, template_id: Uuid) -> Result<(), sqlx::Error> {
/// assert_eq!(attach(&pool, template_id, program_id).await?, AttachOutcome::Created);
/// assert_eq!(attach(&pool, template_id, program_id).await?, AttachOutcome::AlreadyLinked);
/// assert!(detach(&pool, template_id, program_id).await?);
/// assert!(!detach(&pool, template_id, program_id).await?);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::lifecycle::LifecycleStatus;
use super::pagination::Pagination;
use super::program::Program;
use super::template::Template;

const LINKED_TEMPLATE_COLUMNS: &str = "t.template_id, t.week_number, t.label, t.notes, \
     t.due_offset_days, t.required, t.visibility, t.sort_order, t.status, t.created_at, \
     t.updated_at, t.deleted_at, l.created_at AS linked_at";

/// Result of [`attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// A new link row was written
    Created,

    /// The link already existed
    AlreadyLinked,

    /// The program or template is missing or soft-deleted
    NotFound,
}

/// Template as seen through a program link
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LinkedTemplate {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub template: Template,

    /// When the template was attached to the program
    pub linked_at: DateTime<Utc>,
}

/// Filters for [`list_templates_for_program`]
#[derive(Debug, Clone, Default)]
pub struct LinkedTemplateFilter {
    pub status: Option<LifecycleStatus>,
    pub include_deleted: bool,
}

impl LinkedTemplateFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>, program_id: Uuid) {
        qb.push(" WHERE l.program_id = ").push_bind(program_id);

        if !self.include_deleted {
            qb.push(" AND t.deleted_at IS NULL");
        }

        if let Some(status) = self.status {
            qb.push(" AND t.status = ").push_bind(status);
        }
    }
}

/// Links a template to a program
///
/// Both sides must exist and be live. The insert is `ON CONFLICT DO NOTHING`
/// so a second call reports [`AttachOutcome::AlreadyLinked`].
pub async fn attach(
    pool: &PgPool,
    template_id: Uuid,
    program_id: Uuid,
) -> Result<AttachOutcome, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO program_template_links (template_id, program_id)
        SELECT t.template_id, p.program_id
        FROM program_task_templates t, programs p
        WHERE t.template_id = $1 AND t.deleted_at IS NULL
          AND p.program_id = $2 AND p.deleted_at IS NULL
        ON CONFLICT (template_id, program_id) DO NOTHING
        "#,
    )
    .bind(template_id)
    .bind(program_id)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        tracing::info!(%template_id, %program_id, "Linked template to program");
        return Ok(AttachOutcome::Created);
    }

    // Nothing inserted: either the link exists or one side is missing
    let both_live: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (SELECT 1 FROM program_task_templates WHERE template_id = $1 AND deleted_at IS NULL)
           AND EXISTS (SELECT 1 FROM programs WHERE program_id = $2 AND deleted_at IS NULL)
        "#,
    )
    .bind(template_id)
    .bind(program_id)
    .fetch_one(pool)
    .await?;

    if both_live {
        Ok(AttachOutcome::AlreadyLinked)
    } else {
        Ok(AttachOutcome::NotFound)
    }
}

/// Unlinks a template from a program, returning whether a row was removed
pub async fn detach(pool: &PgPool, template_id: Uuid, program_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM program_template_links WHERE template_id = $1 AND program_id = $2",
    )
    .bind(template_id)
    .bind(program_id)
    .execute(pool)
    .await?;

    let removed = result.rows_affected() > 0;
    if removed {
        tracing::info!(%template_id, %program_id, "Unlinked template from program");
    }

    Ok(removed)
}

/// Lists the templates linked to a program, ordered by week, sort order and label
pub async fn list_templates_for_program(
    pool: &PgPool,
    program_id: Uuid,
    filter: &LinkedTemplateFilter,
    page: Pagination,
) -> Result<(Vec<LinkedTemplate>, i64), sqlx::Error> {
    let mut count = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM program_template_links l \
         JOIN program_task_templates t ON t.template_id = l.template_id",
    );
    filter.push_where(&mut count, program_id);
    let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {LINKED_TEMPLATE_COLUMNS} FROM program_template_links l \
         JOIN program_task_templates t ON t.template_id = l.template_id"
    ));
    filter.push_where(&mut qb, program_id);
    qb.push(" ORDER BY t.week_number, t.sort_order, t.label, t.template_id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset);

    let templates = qb.build_query_as::<LinkedTemplate>().fetch_all(pool).await?;

    Ok((templates, total))
}

/// Linked templates that produce tasks: published and not soft-deleted
pub async fn published_templates_for_program<'e, E>(
    executor: E,
    program_id: Uuid,
) -> Result<Vec<Template>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Template>(
        r#"
        SELECT t.template_id, t.week_number, t.label, t.notes, t.due_offset_days, t.required,
               t.visibility, t.sort_order, t.status, t.created_at, t.updated_at, t.deleted_at
        FROM program_template_links l
        JOIN program_task_templates t ON t.template_id = l.template_id
        WHERE l.program_id = $1
          AND t.status = 'published'
          AND t.deleted_at IS NULL
        ORDER BY t.week_number, t.sort_order, t.label
        "#,
    )
    .bind(program_id)
    .fetch_all(executor)
    .await
}

/// Live programs a template is linked to, ordered by title
pub async fn list_programs_for_template(
    pool: &PgPool,
    template_id: Uuid,
) -> Result<Vec<Program>, sqlx::Error> {
    sqlx::query_as::<_, Program>(
        r#"
        SELECT p.program_id, p.title, p.description, p.status, p.total_weeks, p.owner_id,
               p.created_at, p.updated_at, p.deleted_at
        FROM program_template_links l
        JOIN programs p ON p.program_id = l.program_id
        WHERE l.template_id = $1 AND p.deleted_at IS NULL
        ORDER BY lower(p.title), p.program_id
        "#,
    )
    .bind(template_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_scopes_to_program() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM program_template_links l");
        LinkedTemplateFilter::default().push_where(&mut qb, Uuid::new_v4());

        let sql = qb.sql();
        assert!(sql.contains("l.program_id = $1"));
        assert!(sql.contains("t.deleted_at IS NULL"));
    }

    #[test]
    fn test_filter_status_and_deleted() {
        let filter = LinkedTemplateFilter {
            status: Some(LifecycleStatus::Published),
            include_deleted: true,
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM program_template_links l");
        filter.push_where(&mut qb, Uuid::new_v4());

        let sql = qb.sql();
        assert!(!sql.contains("deleted_at IS NULL"));
        assert!(sql.contains("t.status = $2"));
    }
}
