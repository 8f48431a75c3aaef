/// Database models for the orientation service
///
/// Each model owns its SQL. List operations return `(rows, total)` so the API
/// layer can build a [`pagination::Page`].
///
/// # Models
///
/// - `user`: user accounts and profile updates
/// - `role`: roles, their permissions and user role assignments
/// - `program`: onboarding programs
/// - `template`: reusable task templates
/// - `program_template_link`: program ↔ template links
/// - `membership`: program assignments and task instantiation
/// - `task`: per-user orientation tasks and date planning
/// - `audit_log`: trigger-populated change history
/// - `lifecycle`: draft/published/deprecated/archived states
/// - `pagination`: limit/offset bounds and page envelopes
///
/// # Example
///
/// ```no_run
/// use orientation_shared::db::pool::{create_pool, DatabaseConfig};
/// use orientation_shared::models::pagination::Pagination;
/// use orientation_shared::models::program::{Program, ProgramFilter};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let (programs, total) = Program::list(&pool, &ProgramFilter::default(), Pagination::default()).await?;
/// println!("showing {} of {}", programs.len(), total);
/// # Ok(())
/// # }
/// ```

pub mod audit_log;
pub mod lifecycle;
pub mod membership;
pub mod pagination;
pub mod program;
pub mod program_template_link;
pub mod role;
pub mod task;
pub mod template;
pub mod user;
