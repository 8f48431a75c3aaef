/// Authentication and authorization
///
/// # Modules
///
/// - [`policy`]: static role-to-permission table and `can()` lookup
/// - [`authorization`]: permission checks and role assignment rules
/// - [`middleware`]: bearer token → [`middleware::AuthContext`]
/// - [`jwt`]: token generation and validation
/// - [`password`]: Argon2id password hashing
///
/// # Example
///
/// ```
/// use orientation_shared::auth::policy::{can, Action, Resource, Role};
///
/// assert!(can(&[Role::Manager], Action::Link, Resource::Templates));
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
