/// Middleware for the API server
///
/// - `auth`: bearer token authentication
/// - `client_ip`: client address resolution honoring `TRUST_PROXY`
/// - `security`: security response headers

pub mod auth;
pub mod client_ip;
pub mod security;
