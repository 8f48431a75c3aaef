/// Orientation task model and database operations
///
/// An orientation task is one user's instance of a template inside a program.
/// Tasks are created when a user is assigned to a program (see
/// [`crate::models::membership`]) and carry their own copy of the template's
/// label, notes and week so later template edits do not rewrite history.
///
/// # Scheduling
///
/// For a membership starting on `S` and a template in week `w` with offset
/// `d`:
///
/// ```text
/// scheduled_for = S + 7·(w − 1) days
/// due_date      = scheduled_for + d days
/// ```
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use orientation_shared::models::task::plan_dates;
///
/// let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
/// let (scheduled, due) = plan_dates(start, 2, 3).unwrap();
/// assert_eq!(scheduled, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
/// assert_eq!(due, NaiveDate::from_ymd_opt(2025, 3, 13).unwrap());
/// ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::pagination::Pagination;
use super::template::Template;

const TASK_COLUMNS: &str = "task_id, user_id, program_id, template_id, week_number, label, notes, \
     required, scheduled_for, due_date, done, completed_at, created_at, updated_at";

/// Orientation task
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrientationTask {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub program_id: Uuid,

    /// Source template; NULL once the template row is gone
    pub template_id: Option<Uuid>,

    pub week_number: i32,
    pub label: String,
    pub notes: Option<String>,
    pub required: bool,
    pub scheduled_for: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub done: bool,

    /// Set while `done` is true
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task computed from a template, not yet stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub template_id: Uuid,
    pub week_number: i32,
    pub label: String,
    pub notes: Option<String>,
    pub required: bool,
    pub scheduled_for: NaiveDate,
    pub due_date: NaiveDate,
}

/// Computes `(scheduled_for, due_date)` for a week and due offset
///
/// Returns `None` if the dates fall outside the supported calendar range.
pub fn plan_dates(start: NaiveDate, week_number: i32, due_offset_days: i32) -> Option<(NaiveDate, NaiveDate)> {
    let weeks = i64::from(week_number.max(1)) - 1;
    let scheduled_for = start.checked_add_signed(Duration::days(7 * weeks))?;
    let due_date = scheduled_for.checked_add_signed(Duration::days(i64::from(due_offset_days.max(0))))?;

    Some((scheduled_for, due_date))
}

/// Plans one task per template for a membership starting on `start`
pub fn plan_tasks(start: NaiveDate, templates: &[Template]) -> Vec<PlannedTask> {
    templates
        .iter()
        .filter_map(|template| {
            let Some((scheduled_for, due_date)) =
                plan_dates(start, template.week_number, template.due_offset_days)
            else {
                tracing::warn!(template_id = %template.template_id, "Skipping template with out-of-range dates");
                return None;
            };

            Some(PlannedTask {
                template_id: template.template_id,
                week_number: template.week_number,
                label: template.label.clone(),
                notes: template.notes.clone(),
                required: template.required,
                scheduled_for,
                due_date,
            })
        })
        .collect()
}

/// Filters for [`OrientationTask::list`]
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub user_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub week: Option<i32>,
    pub done: Option<bool>,
}

impl TaskFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");

        if let Some(user_id) = self.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(program_id) = self.program_id {
            qb.push(" AND program_id = ").push_bind(program_id);
        }
        if let Some(week) = self.week {
            qb.push(" AND week_number = ").push_bind(week);
        }
        if let Some(done) = self.done {
            qb.push(" AND done = ").push_bind(done);
        }
    }
}

/// Task changes; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    /// Marks the task done (sets `completed_at`) or reopens it (clears it)
    pub done: Option<bool>,
    pub notes: Option<Option<String>>,
    pub scheduled_for: Option<Option<NaiveDate>>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl OrientationTask {
    /// Stores planned tasks for a member, skipping ones that already exist
    ///
    /// Returns the number of tasks inserted.
    pub async fn instantiate(
        conn: &mut PgConnection,
        user_id: Uuid,
        program_id: Uuid,
        planned: &[PlannedTask],
    ) -> Result<u64, sqlx::Error> {
        if planned.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO orientation_tasks \
             (user_id, program_id, template_id, week_number, label, notes, required, scheduled_for, due_date) ",
        );
        qb.push_values(planned, |mut row, task| {
            row.push_bind(user_id)
                .push_bind(program_id)
                .push_bind(task.template_id)
                .push_bind(task.week_number)
                .push_bind(task.label.clone())
                .push_bind(task.notes.clone())
                .push_bind(task.required)
                .push_bind(task.scheduled_for)
                .push_bind(task.due_date);
        });
        qb.push(" ON CONFLICT ON CONSTRAINT orientation_tasks_instance_key DO NOTHING");

        let result = qb.build().execute(&mut *conn).await?;

        tracing::debug!(%user_id, %program_id, inserted = result.rows_affected(), "Instantiated orientation tasks");

        Ok(result.rows_affected())
    }

    /// Finds a task by ID
    pub async fn find_by_id<'e, E>(executor: E, task_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {TASK_COLUMNS} FROM orientation_tasks WHERE task_id = $1");

        sqlx::query_as::<_, OrientationTask>(&query)
            .bind(task_id)
            .fetch_optional(executor)
            .await
    }

    /// Lists tasks ordered by week, scheduled date and label
    pub async fn list(
        pool: &PgPool,
        filter: &TaskFilter,
        page: Pagination,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orientation_tasks");
        filter.push_where(&mut count);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS} FROM orientation_tasks"));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY week_number, scheduled_for NULLS LAST, label, task_id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let tasks = qb.build_query_as::<OrientationTask>().fetch_all(pool).await?;

        Ok((tasks, total))
    }

    /// Applies task changes
    ///
    /// Marking a task done keeps an existing `completed_at`; reopening it
    /// clears the timestamp.
    pub async fn update(
        pool: &PgPool,
        task_id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE orientation_tasks SET updated_at = NOW()");

        if let Some(done) = data.done {
            qb.push(", done = ")
                .push_bind(done)
                .push(", completed_at = CASE WHEN ")
                .push_bind(done)
                .push(" THEN COALESCE(completed_at, NOW()) ELSE NULL END");
        }
        if let Some(notes) = data.notes {
            qb.push(", notes = ").push_bind(notes);
        }
        if let Some(scheduled_for) = data.scheduled_for {
            qb.push(", scheduled_for = ").push_bind(scheduled_for);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }

        qb.push(" WHERE task_id = ")
            .push_bind(task_id)
            .push(format!(" RETURNING {TASK_COLUMNS}"));

        qb.build_query_as::<OrientationTask>().fetch_optional(pool).await
    }

    /// Deletes a member's tasks in a program that are not done yet
    pub async fn delete_open_for_member(
        conn: &mut PgConnection,
        program_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM orientation_tasks WHERE program_id = $1 AND user_id = $2 AND NOT done",
        )
        .bind(program_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }
}
