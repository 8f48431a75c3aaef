//! # Orientation API Server Library
//!
//! HTTP layer of the orientation admin service: onboarding programs, task
//! templates, member assignment and per-user orientation tasks, guarded by
//! role-based access control.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Authentication, client IP and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
