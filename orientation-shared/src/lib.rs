//! # Orientation Shared Library
//!
//! Domain types, authorization and persistence for the orientation service.
//! The HTTP layer lives in `orientation-api`.
//!
//! ## Module Organization
//!
//! - `auth`: RBAC policy, permission checks, JWT and password hashing
//! - `db`: connection pool and embedded migrations
//! - `models`: database models and their queries

pub mod auth;
pub mod db;
pub mod models;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
