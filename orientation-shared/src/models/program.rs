/// Orientation program model and database operations
///
/// A program is a multi-week onboarding curriculum. Its tasks come from the
/// task templates linked to it (see [`crate::models::program_template_link`]).
/// Programs are soft-deleted through `deleted_at` and never removed.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE programs (
///     program_id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status lifecycle_status NOT NULL DEFAULT 'draft',
///     total_weeks INTEGER NOT NULL DEFAULT 1 CHECK (total_weeks BETWEEN 1 AND 52),
///     owner_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use orientation_shared::models::lifecycle::LifecycleAction;
/// use orientation_shared::models::program::{CreateProgram, Program};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let program = Program::create(&pool, CreateProgram {
///     title: "Support engineer onboarding".to_string(),
///     description: None,
///     total_weeks: 4,
///     owner_id: None,
/// }).await?;
///
/// Program::apply_lifecycle(&pool, program.program_id, LifecycleAction::Publish).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::lifecycle::{LifecycleAction, LifecycleStatus};
use super::pagination::{search_pattern, Pagination};

/// Longest program a caller can define
pub const MAX_TOTAL_WEEKS: i32 = 52;

const PROGRAM_COLUMNS: &str =
    "program_id, title, description, status, total_weeks, owner_id, created_at, updated_at, deleted_at";

/// Orientation program
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Program {
    pub program_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: LifecycleStatus,

    /// Length in weeks, 1..=52
    pub total_weeks: i32,

    /// User responsible for the program
    pub owner_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Set when soft-deleted
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Program {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for creating a program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProgram {
    pub title: String,
    pub description: Option<String>,
    pub total_weeks: i32,
    pub owner_id: Option<Uuid>,
}

/// Program changes; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProgram {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub total_weeks: Option<i32>,
    pub owner_id: Option<Option<Uuid>>,
}

/// Filters for [`Program::list`]
#[derive(Debug, Clone, Default)]
pub struct ProgramFilter {
    pub status: Option<LifecycleStatus>,

    /// Substring match on title and description
    pub q: Option<String>,

    /// Include soft-deleted programs
    pub include_deleted: bool,
}

impl ProgramFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");

        if !self.include_deleted {
            qb.push(" AND deleted_at IS NULL");
        }

        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status);
        }

        if let Some(pattern) = search_pattern(self.q.as_deref()) {
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

impl Program {
    /// Creates a program in `draft`
    pub async fn create<'e, E>(executor: E, data: CreateProgram) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO programs (title, description, total_weeks, owner_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {PROGRAM_COLUMNS}"
        );

        let program = sqlx::query_as::<_, Program>(&query)
            .bind(data.title.trim())
            .bind(data.description)
            .bind(data.total_weeks)
            .bind(data.owner_id)
            .fetch_one(executor)
            .await?;

        tracing::debug!(program_id = %program.program_id, "Created program");

        Ok(program)
    }

    /// Finds a program by ID
    ///
    /// Soft-deleted programs are only returned when `include_deleted` is set.
    pub async fn find_by_id<'e, E>(
        executor: E,
        program_id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {PROGRAM_COLUMNS} FROM programs
             WHERE program_id = $1 AND ($2 OR deleted_at IS NULL)"
        );

        sqlx::query_as::<_, Program>(&query)
            .bind(program_id)
            .bind(include_deleted)
            .fetch_optional(executor)
            .await
    }

    /// Lists programs ordered by title, returning the page and the total
    pub async fn list(
        pool: &PgPool,
        filter: &ProgramFilter,
        page: Pagination,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM programs");
        filter.push_where(&mut count);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {PROGRAM_COLUMNS} FROM programs"));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY lower(title), program_id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let programs = qb.build_query_as::<Program>().fetch_all(pool).await?;

        Ok((programs, total))
    }

    /// Applies changes to a live program
    ///
    /// Returns `None` when the program does not exist or is soft-deleted.
    pub async fn update(
        pool: &PgPool,
        program_id: Uuid,
        data: UpdateProgram,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE programs SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(total_weeks) = data.total_weeks {
            qb.push(", total_weeks = ").push_bind(total_weeks);
        }
        if let Some(owner_id) = data.owner_id {
            qb.push(", owner_id = ").push_bind(owner_id);
        }

        qb.push(" WHERE program_id = ")
            .push_bind(program_id)
            .push(" AND deleted_at IS NULL")
            .push(format!(" RETURNING {PROGRAM_COLUMNS}"));

        qb.build_query_as::<Program>().fetch_optional(pool).await
    }

    /// Soft-deletes a program
    ///
    /// Returns false when the program does not exist or is already deleted.
    pub async fn soft_delete(pool: &PgPool, program_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE programs SET deleted_at = NOW(), updated_at = NOW()
             WHERE program_id = $1 AND deleted_at IS NULL",
        )
        .bind(program_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Writes the status for a lifecycle action
    ///
    /// The write is unconditional: the current status is not consulted.
    /// `restore` also clears `deleted_at`, and it is the only action that
    /// reaches soft-deleted rows.
    pub async fn apply_lifecycle(
        pool: &PgPool,
        program_id: Uuid,
        action: LifecycleAction,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE programs
             SET status = $2,
                 deleted_at = CASE WHEN $3 THEN NULL ELSE deleted_at END,
                 updated_at = NOW()
             WHERE program_id = $1 AND ($3 OR deleted_at IS NULL)
             RETURNING {PROGRAM_COLUMNS}"
        );

        let program = sqlx::query_as::<_, Program>(&query)
            .bind(program_id)
            .bind(action.target_status())
            .bind(action.clears_soft_delete())
            .fetch_optional(pool)
            .await?;

        if let Some(program) = &program {
            tracing::info!(
                program_id = %program.program_id,
                action = action.as_str(),
                status = program.status.as_str(),
                "Program lifecycle change"
            );
        }

        Ok(program)
    }
}
