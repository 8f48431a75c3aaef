/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use orientation_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{auth::require_auth, client_ip::client_ip_layer, security::SecurityHeadersLayer},
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into every handler through Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Token signing secret
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Builds the complete router with all routes and middleware
///
/// ```text
/// /health                                   public
/// /auth/{login,refresh}                     public
/// /me                                       GET, PATCH
/// /rbac/roles, /rbac/me/permissions         GET
/// /api/users[/:id[/status|/roles]]
/// /api/programs[/:id[/publish|/deprecate|/archive|/restore]]
/// /api/programs/:id/templates[/:template_id]
/// /api/programs/:id/members[/:user_id]
/// /api/templates[/:id[/publish|/deprecate|/archive|/restore|/programs]]
/// /api/tasks[/:id]
/// /api/audit
/// ```
///
/// Everything except `/health` and `/auth` requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/refresh", post(routes::auth::refresh));

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users).post(routes::users::create_user))
        .route(
            "/:id",
            get(routes::users::get_user)
                .patch(routes::users::update_user)
                .delete(routes::users::archive_user),
        )
        .route("/:id/status", patch(routes::users::set_status))
        .route("/:id/roles", put(routes::users::replace_roles));

    let program_routes = Router::new()
        .route(
            "/",
            get(routes::programs::list_programs).post(routes::programs::create_program),
        )
        .route(
            "/:id",
            get(routes::programs::get_program)
                .patch(routes::programs::update_program)
                .delete(routes::programs::delete_program),
        )
        .route("/:id/publish", post(routes::programs::publish_program))
        .route("/:id/deprecate", post(routes::programs::deprecate_program))
        .route("/:id/archive", post(routes::programs::archive_program))
        .route("/:id/restore", post(routes::programs::restore_program))
        .route("/:id/templates", get(routes::programs::list_program_templates))
        .route(
            "/:id/templates/:template_id",
            post(routes::programs::attach_template).delete(routes::programs::detach_template),
        )
        .route(
            "/:id/members",
            get(routes::programs::list_members).post(routes::programs::assign_member),
        )
        .route("/:id/members/:user_id", delete(routes::programs::remove_member));

    let template_routes = Router::new()
        .route(
            "/",
            get(routes::templates::list_templates).post(routes::templates::create_template),
        )
        .route(
            "/:id",
            get(routes::templates::get_template)
                .patch(routes::templates::update_template)
                .delete(routes::templates::delete_template),
        )
        .route("/:id/publish", post(routes::templates::publish_template))
        .route("/:id/deprecate", post(routes::templates::deprecate_template))
        .route("/:id/archive", post(routes::templates::archive_template))
        .route("/:id/restore", post(routes::templates::restore_template))
        .route("/:id/programs", get(routes::templates::list_template_programs));

    let task_routes = Router::new()
        .route("/", get(routes::tasks::list_tasks))
        .route("/:id", get(routes::tasks::get_task).patch(routes::tasks::update_task));

    let api_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/programs", program_routes)
        .nest("/templates", template_routes)
        .nest("/tasks", task_routes)
        .route("/audit", get(routes::audit::list_audit));

    let protected_routes = Router::new()
        .route("/me", get(routes::me::get_me).patch(routes::me::update_me))
        .route("/rbac/roles", get(routes::rbac::list_roles))
        .route("/rbac/me/permissions", get(routes::rbac::my_permissions))
        .nest("/api", api_routes)
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(from_fn_with_state(state.clone(), client_ip_layer))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
