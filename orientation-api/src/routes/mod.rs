/// API route handlers
///
/// Handlers are grouped by resource:
///
/// - `health`: health check
/// - `auth`: login and token refresh
/// - `me`: the caller's own profile
/// - `rbac`: roles and effective permissions
/// - `users`: user directory and role assignment
/// - `programs`: programs, their template links and members
/// - `templates`: task templates
/// - `tasks`: orientation tasks
/// - `audit`: audit log
///
/// Request bodies, query strings and path parameters go through the
/// [`AppJson`], [`AppQuery`] and [`AppPath`] extractors so malformed input is
/// reported in the same JSON error shape as every other failure.

use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

pub mod audit;
pub mod auth;
pub mod health;
pub mod me;
pub mod programs;
pub mod rbac;
pub mod tasks;
pub mod templates;
pub mod users;

/// `Json` with [`ApiError`] rejections
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// `Query` with [`ApiError`] rejections
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

/// `Path` with [`ApiError`] rejections
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Deserializes a field that distinguishes "absent" from `null`
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: a
/// missing key stays `None`, `null` becomes `Some(None)` and a value becomes
/// `Some(Some(value))`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Standard `limit`/`offset` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `include_deleted` flag for single-row lookups of soft-deletable resources
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeletedQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

/// Trims a required string, failing with a 422 on `field` when it is blank
/// or longer than `max` characters
pub(crate) fn required_text(field: &str, value: &str, max: usize) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(field, format!("{} must not be empty", field)));
    }
    if value.chars().count() > max {
        return Err(ApiError::validation(
            field,
            format!("{} must be at most {} characters", field, max),
        ));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        organization: Option<Option<String>>,
    }

    #[test]
    fn test_double_option_absent_null_and_value() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.organization, None);

        let null: Patch = serde_json::from_str(r#"{"organization": null}"#).unwrap();
        assert_eq!(null.organization, Some(None));

        let value: Patch = serde_json::from_str(r#"{"organization": "Ops"}"#).unwrap();
        assert_eq!(value.organization, Some(Some("Ops".to_string())));
    }

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("title", "  Week one ", 255).unwrap(), "Week one");
        assert!(matches!(
            required_text("title", "   ", 255),
            Err(ApiError::ValidationError(ref d)) if d[0].field == "title"
        ));
        assert!(required_text("title", "abcd", 3).is_err());
    }
}
