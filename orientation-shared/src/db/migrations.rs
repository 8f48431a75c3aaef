/// Embedded schema migrations
///
/// The SQL files under the workspace `migrations/` directory are compiled
/// into the binary with `sqlx::migrate!` and applied at startup when
/// `RUN_MIGRATIONS` is enabled.

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPool;
use tracing::{debug, info, warn};

/// Migrations bundled at compile time
pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Applied versus bundled migrations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied_migrations: usize,
    pub latest_version: Option<i64>,

    /// Every bundled migration has been applied
    pub is_up_to_date: bool,
}

/// Applies all pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    info!(bundled = MIGRATOR.iter().count(), "Running database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        e
    })?;

    info!("Database migrations complete");
    Ok(())
}

/// Reports how many bundled migrations have been applied
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            is_up_to_date: MIGRATOR.iter().next().is_none(),
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    let applied_migrations = usize::try_from(count).unwrap_or(0);
    let bundled_latest = MIGRATOR.iter().map(|m| m.version).max();

    Ok(MigrationStatus {
        applied_migrations,
        latest_version,
        is_up_to_date: latest_version >= bundled_latest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_bundled_in_order() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();

        assert_eq!(versions.len(), 4);
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_audit_migration_is_last() {
        let last = MIGRATOR.iter().last().unwrap();
        assert!(last.description.contains("audit"));
    }
}
