/// Role records and user role assignments
///
/// Role keys are stored as strings (`roles.role_key`, `user_roles.role_key`)
/// and parsed into [`Role`] on load. Keys that no longer correspond to a
/// builtin role are skipped with a warning rather than failing the request.
///
/// # Example
///
/// ```no_run
/// use orientation_shared::auth::policy::Role;
/// use orientation_shared::models::role::UserRole;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// UserRole::replace_for_user(&mut tx, user_id, &[Role::Trainee]).await?;
/// tx.commit().await?;
///
/// let roles = UserRole::roles_for_user(&pool, user_id).await?;
/// assert_eq!(roles, vec![Role::Trainee]);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::policy::Role;

/// Role row with the permission keys granted in the database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleRecord {
    pub role_key: String,
    pub description: String,
    pub permissions: Vec<String>,
}

impl RoleRecord {
    /// Lists every role with its permission keys, ordered by role key
    pub async fn list_with_permissions(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, RoleRecord>(
            r#"
            SELECT r.role_key,
                   r.description,
                   COALESCE(
                       ARRAY_AGG(rp.perm_key ORDER BY rp.perm_key) FILTER (WHERE rp.perm_key IS NOT NULL),
                       ARRAY[]::VARCHAR[]
                   ) AS permissions
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role_key = r.role_key
            GROUP BY r.role_key, r.description
            ORDER BY r.role_key
            "#,
        )
        .fetch_all(pool)
        .await
    }
}

/// Role assignment row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_key: String,
    pub created_at: DateTime<Utc>,
}

fn parse_role_keys(keys: impl IntoIterator<Item = String>) -> Vec<Role> {
    let mut roles: Vec<Role> = keys
        .into_iter()
        .filter_map(|key| match key.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unknown role assignment");
                None
            }
        })
        .collect();

    roles.sort();
    roles.dedup();
    roles
}

impl UserRole {
    /// Loads the builtin roles held by a user
    pub async fn roles_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Role>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT role_key FROM user_roles WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(executor)
                .await?;

        Ok(parse_role_keys(keys))
    }

    /// Loads roles for several users in one query
    ///
    /// Users without roles are absent from the map.
    pub async fn roles_for_users(
        pool: &PgPool,
        user_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Role>>, sqlx::Error> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT user_id, role_key FROM user_roles WHERE user_id = ANY($1) ORDER BY user_id",
        )
        .bind(user_ids)
        .fetch_all(pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<String>> = HashMap::new();
        for (user_id, key) in rows {
            grouped.entry(user_id).or_default().push(key);
        }

        Ok(grouped
            .into_iter()
            .map(|(user_id, keys)| (user_id, parse_role_keys(keys)))
            .collect())
    }

    /// Replaces a user's role set
    ///
    /// Meant to run inside a transaction so readers never observe a user
    /// with no roles mid-update.
    pub async fn replace_for_user(
        conn: &mut PgConnection,
        user_id: Uuid,
        roles: &[Role],
    ) -> Result<(), sqlx::Error> {
        let keys: Vec<&str> = roles.iter().map(Role::as_str).collect();

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND NOT (role_key = ANY($2))")
            .bind(user_id)
            .bind(&keys)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_key)
            SELECT $1, UNNEST($2::VARCHAR[])
            ON CONFLICT (user_id, role_key) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(&keys)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_keys_sorts_and_skips_unknown() {
        let roles = parse_role_keys(vec![
            "trainee".to_string(),
            "superuser".to_string(),
            "admin".to_string(),
            "trainee".to_string(),
        ]);

        assert_eq!(roles, vec![Role::Admin, Role::Trainee]);
    }

    #[test]
    fn test_parse_role_keys_empty() {
        assert!(parse_role_keys(Vec::new()).is_empty());
    }
}
