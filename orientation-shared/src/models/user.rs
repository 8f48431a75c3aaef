/// User model and database operations
///
/// Users sign in either with a local password (Argon2id hash in
/// `password_hash`) or through an OAuth provider identity
/// (`auth_provider` + `provider_subject`). Roles live in `user_roles`, see
/// [`crate::models::role`].
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_status AS ENUM ('active', 'pending', 'suspended', 'archived');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     username VARCHAR(64),
///     email VARCHAR(255) NOT NULL,
///     full_name VARCHAR(255) NOT NULL,
///     organization VARCHAR(255),
///     status user_status NOT NULL DEFAULT 'pending',
///     password_hash VARCHAR(255),
///     auth_provider VARCHAR(50),
///     provider_subject VARCHAR(255),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// CREATE UNIQUE INDEX users_email_key ON users (lower(email));
/// ```
///
/// # Example
///
/// ```no_run
/// use orientation_shared::models::user::{CreateUser, User, UserStatus};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     email: "new.hire@example.com".to_string(),
///     full_name: "New Hire".to_string(),
///     username: None,
///     organization: Some("Support".to_string()),
///     password_hash: None,
///     status: UserStatus::Pending,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "NEW.HIRE@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use std::str::FromStr;
use uuid::Uuid;

use super::pagination::{search_pattern, Pagination};

const USER_COLUMNS: &str = "id, username, email, full_name, organization, status, password_hash, \
     auth_provider, provider_subject, created_at, updated_at, last_login_at";

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    /// Can sign in
    Active,

    /// Created but not yet activated (no password set)
    Pending,

    /// Temporarily blocked
    Suspended,

    /// Removed from the directory; kept for history
    Archived,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Pending => "pending",
            UserStatus::Suspended => "suspended",
            UserStatus::Archived => "archived",
        }
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "pending" => Ok(UserStatus::Pending),
            "suspended" => Ok(UserStatus::Suspended),
            "archived" => Ok(UserStatus::Archived),
            other => Err(format!("Unknown user status: {}", other)),
        }
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Optional login name, unique case-insensitively
    pub username: Option<String>,

    /// Email address, stored lowercase and unique
    pub email: String,

    /// Display name
    pub full_name: String,

    /// Organization or department; NULL when cleared
    pub organization: Option<String>,

    /// Account status
    pub status: UserStatus,

    /// Argon2id hash for local accounts
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,

    /// OAuth provider name (e.g. "google")
    pub auth_provider: Option<String>,

    /// Subject identifier at the OAuth provider
    #[serde(skip_serializing, default)]
    pub provider_subject: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub full_name: String,
    pub username: Option<String>,
    pub organization: Option<String>,
    pub password_hash: Option<String>,
    pub status: UserStatus,
}

/// Profile changes
///
/// `None` leaves a field untouched. For nullable columns `Some(None)` clears
/// the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub organization: Option<Option<String>>,
    pub username: Option<Option<String>>,
}

/// Trims a value, mapping blank strings to `None`
pub fn trim_to_option(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl UpdateProfile {
    /// Trims every field, lowercases the email and turns blank nullable
    /// fields into NULL
    ///
    /// A blank `full_name` or `email` stays as an empty string so validation
    /// can reject it.
    pub fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.map(|v| v.trim().to_string()),
            email: self.email.map(|v| v.trim().to_lowercase()),
            organization: self.organization.map(trim_to_option),
            username: self.username.map(trim_to_option),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.organization.is_none()
            && self.username.is_none()
    }
}

/// Filters for [`User::list`]
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub status: Option<UserStatus>,

    /// Substring match on email, full name and username
    pub q: Option<String>,
}

impl UserFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" WHERE TRUE");

        if let Some(status) = self.status {
            qb.push(" AND status = ").push_bind(status);
        }

        if let Some(pattern) = search_pattern(self.q.as_deref()) {
            qb.push(" AND (email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR full_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR username ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns a database error carrying constraint `users_email_key` when
    /// the email is already taken.
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO users (email, full_name, username, organization, password_hash, status)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.email.trim().to_lowercase())
            .bind(data.full_name.trim())
            .bind(trim_to_option(data.username))
            .bind(trim_to_option(data.organization))
            .bind(data.password_hash)
            .bind(data.status)
            .fetch_one(executor)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by email, case-insensitively
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");

        sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    /// Lists users ordered by full name, returning the page and the total
    pub async fn list(
        pool: &PgPool,
        filter: &UserFilter,
        page: Pagination,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        filter.push_where(&mut count);
        let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        filter.push_where(&mut qb);
        qb.push(" ORDER BY lower(full_name), id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let users = qb.build_query_as::<User>().fetch_all(pool).await?;

        Ok((users, total))
    }

    /// Applies profile changes
    ///
    /// Values are expected to be [normalized](UpdateProfile::normalized)
    /// already. Returns `None` when the user does not exist.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");

        if let Some(full_name) = data.full_name {
            qb.push(", full_name = ").push_bind(full_name);
        }
        if let Some(email) = data.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(organization) = data.organization {
            qb.push(", organization = ").push_bind(organization);
        }
        if let Some(username) = data.username {
            qb.push(", username = ").push_bind(username);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(format!(" RETURNING {USER_COLUMNS}"));

        qb.build_query_as::<User>().fetch_optional(pool).await
    }

    /// Sets the account status
    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        status: UserStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(pool)
            .await
    }

    /// Records a successful sign-in
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_trims_whitespace() {
        let update = UpdateProfile {
            full_name: Some("  Ada Lovelace ".to_string()),
            email: Some(" Ada@Example.COM ".to_string()),
            organization: Some(Some("  Analytical Engines  ".to_string())),
            username: None,
        }
        .normalized();

        assert_eq!(update.full_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(update.email.as_deref(), Some("ada@example.com"));
        assert_eq!(update.organization, Some(Some("Analytical Engines".to_string())));
        assert_eq!(update.username, None);
    }

    #[test]
    fn test_blank_organization_clears_to_null() {
        let update = UpdateProfile {
            organization: Some(Some("   ".to_string())),
            ..Default::default()
        }
        .normalized();

        assert_eq!(update.organization, Some(None));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_explicit_null_organization_stays_null() {
        let update = UpdateProfile {
            organization: Some(None),
            ..Default::default()
        }
        .normalized();

        assert_eq!(update.organization, Some(None));
    }

    #[test]
    fn test_blank_full_name_is_kept_for_validation() {
        let update = UpdateProfile {
            full_name: Some("   ".to_string()),
            ..Default::default()
        }
        .normalized();

        assert_eq!(update.full_name.as_deref(), Some(""));
    }

    #[test]
    fn test_user_status_parse() {
        assert_eq!("suspended".parse::<UserStatus>().unwrap(), UserStatus::Suspended);
        assert!("deleted".parse::<UserStatus>().is_err());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: None,
            email: "a@example.com".to_string(),
            full_name: "A".to_string(),
            organization: None,
            status: UserStatus::Active,
            password_hash: Some("$argon2id$secret".to_string()),
            auth_provider: None,
            provider_subject: Some("google-sub".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("provider_subject").is_none());
        assert!(json["organization"].is_null());
    }

    #[test]
    fn test_trim_to_option() {
        assert_eq!(trim_to_option(Some("  x ".to_string())), Some("x".to_string()));
        assert_eq!(trim_to_option(Some("".to_string())), None);
        assert_eq!(trim_to_option(None), None);
    }
}
