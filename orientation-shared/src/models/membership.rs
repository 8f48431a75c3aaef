/// Program membership model and database operations
///
/// A membership assigns a user to a program with a start date. Assigning
/// instantiates one orientation task per linked template that is published
/// and not soft-deleted; removing a member deletes their open tasks in the
/// program and keeps completed ones as history.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE program_memberships (
///     program_id UUID NOT NULL REFERENCES programs(program_id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     start_date DATE NOT NULL DEFAULT CURRENT_DATE,
///     assigned_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (program_id, user_id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use chrono::NaiveDate;
/// use orientation_shared::models::membership::Membership;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, program_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let start = NaiveDate::from_ymd_opt(2025, 9, 1);
/// let assigned = Membership::assign(&pool, program_id, user_id, start).await?;
/// println!("{} tasks created", assigned.tasks_created);
///
/// Membership::remove(&pool, program_id, user_id).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::pagination::Pagination;
use super::program_template_link::published_templates_for_program;
use super::task::{plan_tasks, OrientationTask};

/// Program membership
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub program_id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub assigned_at: DateTime<Utc>,
}

/// Membership joined with the member's profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub start_date: NaiveDate,
    pub assigned_at: DateTime<Utc>,
}

/// Result of [`Membership::assign`]
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub membership: Membership,

    /// Tasks inserted by this call; 0 when the member already had them all
    pub tasks_created: u64,
}

impl Membership {
    /// Assigns a user to a program and instantiates their tasks
    ///
    /// Repeating the call keeps the original start date and only adds tasks
    /// for templates published since. `start_date` defaults to today.
    pub async fn assign(
        pool: &PgPool,
        program_id: Uuid,
        user_id: Uuid,
        start_date: Option<NaiveDate>,
    ) -> Result<Assignment, sqlx::Error> {
        let start_date = start_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO program_memberships (program_id, user_id, start_date)
            VALUES ($1, $2, $3)
            ON CONFLICT (program_id, user_id) DO NOTHING
            "#,
        )
        .bind(program_id)
        .bind(user_id)
        .bind(start_date)
        .execute(&mut *tx)
        .await?;

        let membership = sqlx::query_as::<_, Membership>(
            "SELECT program_id, user_id, start_date, assigned_at
             FROM program_memberships WHERE program_id = $1 AND user_id = $2",
        )
        .bind(program_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let templates = published_templates_for_program(&mut *tx, program_id).await?;
        let planned = plan_tasks(membership.start_date, &templates);
        let tasks_created = OrientationTask::instantiate(&mut tx, user_id, program_id, &planned).await?;

        tx.commit().await?;

        tracing::info!(%program_id, %user_id, tasks_created, "Assigned user to program");

        Ok(Assignment {
            membership,
            tasks_created,
        })
    }

    /// Lists a program's members ordered by name
    pub async fn list_members(
        pool: &PgPool,
        program_id: Uuid,
        page: Pagination,
    ) -> Result<(Vec<Member>, i64), sqlx::Error> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM program_memberships WHERE program_id = $1")
                .bind(program_id)
                .fetch_one(pool)
                .await?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT u.id AS user_id, u.email, u.full_name, m.start_date, m.assigned_at \
             FROM program_memberships m JOIN users u ON u.id = m.user_id \
             WHERE m.program_id = ",
        );
        qb.push_bind(program_id)
            .push(" ORDER BY lower(u.full_name), u.id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let members = qb.build_query_as::<Member>().fetch_all(pool).await?;

        Ok((members, total))
    }

    /// Removes a member and their open tasks in the program
    ///
    /// Returns `None` when the user was not a member, otherwise the number of
    /// tasks deleted.
    pub async fn remove(
        pool: &PgPool,
        program_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<u64>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM program_memberships WHERE program_id = $1 AND user_id = $2",
        )
        .bind(program_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let tasks_deleted = OrientationTask::delete_open_for_member(&mut tx, program_id, user_id).await?;

        tx.commit().await?;

        tracing::info!(%program_id, %user_id, tasks_deleted, "Removed user from program");

        Ok(Some(tasks_deleted))
    }
}
