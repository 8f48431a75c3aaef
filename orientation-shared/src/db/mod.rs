/// Database layer
///
/// - `pool`: PostgreSQL connection pool setup and health checks
/// - `migrations`: embedded migrations from the workspace `migrations/` directory
///
/// Models live in [`crate::models`].
///
/// # Example
///
/// ```no_run
/// use orientation_shared::db::migrations::run_migrations;
/// use orientation_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
