/// Read access to the audit log
///
/// Rows are written only by the `audit_row_change()` trigger on every
/// mutable table; the service never inserts or edits them. Password hashes
/// are stripped from the captured row images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::pagination::Pagination;

/// Tables that carry an audit trigger
pub const AUDITED_TABLES: [&str; 7] = [
    "users",
    "user_roles",
    "programs",
    "program_task_templates",
    "program_template_links",
    "program_memberships",
    "orientation_tasks",
];

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub table_name: String,

    /// Primary key of the changed row, `:`-joined for composite keys
    pub row_pk: Option<String>,

    /// `INSERT`, `UPDATE` or `DELETE`
    pub action: String,

    pub old_data: Option<serde_json::Value>,
    pub new_data: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

/// Filters for [`AuditEntry::list`]
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub table: Option<String>,

    /// Matched case-insensitively
    pub action: Option<String>,
}

impl AuditFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");

        if let Some(table) = &self.table {
            qb.push(" AND table_name = ").push_bind(table.clone());
        }
        if let Some(action) = &self.action {
            qb.push(" AND action = ").push_bind(action.to_uppercase());
        }
    }
}

impl AuditEntry {
    /// Lists entries newest first
    pub async fn list(
        pool: &PgPool,
        filter: &AuditFilter,
        page: Pagination,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_log");
        filter.push_where(&mut count);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, table_name, row_pk, action, old_data, new_data, changed_at FROM audit_log",
        );
        filter.push_where(&mut qb);
        qb.push(" ORDER BY changed_at DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let entries = qb.build_query_as::<AuditEntry>().fetch_all(pool).await?;

        Ok((entries, total))
    }
}
