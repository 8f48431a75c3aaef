/// Audit log endpoint
///
/// ```text
/// GET /api/audit?table=users&action=update&limit=50
/// ```
///
/// Newest entries first. `table` must name an audited table and `action`
/// one of `INSERT`, `UPDATE`, `DELETE` (any case).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{AppQuery, PageQuery},
};
use axum::{extract::State, Extension, Json};
use orientation_shared::{
    auth::{
        authorization::require,
        middleware::AuthContext,
        policy::{Action, Resource},
    },
    models::{
        audit_log::{AuditEntry, AuditFilter, AUDITED_TABLES},
        pagination::{Page, Pagination},
    },
};
use serde::Deserialize;

const AUDIT_ACTIONS: [&str; 3] = ["INSERT", "UPDATE", "DELETE"];

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub table: Option<String>,
    pub action: Option<String>,
}

impl AuditQuery {
    fn into_filter(self) -> ApiResult<AuditFilter> {
        let table = self.table.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        if let Some(table) = &table {
            if !AUDITED_TABLES.contains(&table.as_str()) {
                return Err(ApiError::validation(
                    "table",
                    format!("Unknown audited table: {}", table),
                ));
            }
        }

        let action = self
            .action
            .map(|a| a.trim().to_uppercase())
            .filter(|a| !a.is_empty());
        if let Some(action) = &action {
            if !AUDIT_ACTIONS.contains(&action.as_str()) {
                return Err(ApiError::validation(
                    "action",
                    "action must be one of INSERT, UPDATE, DELETE",
                ));
            }
        }

        Ok(AuditFilter { table, action })
    }
}

pub async fn list_audit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppQuery(query): AppQuery<AuditQuery>,
    AppQuery(page): AppQuery<PageQuery>,
) -> ApiResult<Json<Page<AuditEntry>>> {
    require(&auth, Action::Read, Resource::Audit)?;

    let filter = query.into_filter()?;
    let pagination = Pagination::new(page.limit, page.offset);

    let (entries, total) = AuditEntry::list(&state.db, &filter, pagination).await?;

    Ok(Json(Page::new(entries, total, pagination)))
}
