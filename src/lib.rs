pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod monitoring;
pub mod payments;
pub mod security;
pub mod services;
pub mod state;
pub mod validation;

use axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
pub use crate::state::AppState;

/// Full HTTP application with every route group and the global middleware stack
pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::public::health::root))
        .route("/health", get(handlers::public::health::health))
        .merge(auth_public_routes(&state))
        .merge(catalogue_routes())
        .merge(webhook_routes(&state))
        // Protected (JWT + tenant + user)
        .merge(protected_routes())
        .merge(admin_routes())
        .merge(root_routes())
        // Global middleware, last added runs first
        .layer(from_fn_with_state(state.clone(), middleware::api_rate_limit))
        .layer(from_fn_with_state(state.clone(), middleware::request_metrics_middleware))
        .layer(cors_layer(&config::config().security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes(state: &AppState) -> Router<AppState> {
    use handlers::public::auth;

    Router::new()
        .route("/auth/register/:tenant", post(auth::register))
        .route("/auth/login/:tenant", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_rate_limit))
}

// Public reads take the slug in the `:id` position; path parameter names must
// match the write routes registered on the same paths.
fn catalogue_routes() -> Router<AppState> {
    use handlers::public::{blog, books, courses, events};

    Router::new()
        .route("/api/books", get(books::list))
        .route("/api/books/:id", get(books::show))
        .route("/api/books/:id/reviews", get(books::reviews))
        .route("/api/courses", get(courses::list))
        .route("/api/courses/:id", get(courses::show))
        .route("/api/events", get(events::list))
        .route("/api/events/:id", get(events::show))
        .route("/api/blog", get(blog::list))
        .route("/api/blog/:id", get(blog::show))
        .route_layer(from_fn(middleware::tenant_header_middleware))
}

fn webhook_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/webhooks/:provider", post(handlers::public::webhooks::receive))
        .route_layer(from_fn_with_state(state.clone(), middleware::webhook_rate_limit))
}

/// Applies JWT, tenant and user validation (outermost first)
fn authenticated(router: Router<AppState>) -> Router<AppState> {
    router
        .route_layer(from_fn(middleware::validate_user_middleware))
        .route_layer(from_fn(middleware::validate_tenant_middleware))
        .route_layer(from_fn(middleware::jwt_auth_middleware))
}

fn protected_routes() -> Router<AppState> {
    use handlers::protected::{books, checkout, enrollments, events, reading_progress, reviews, whoami};

    authenticated(
        Router::new()
            .route("/api/auth/whoami", get(whoami::whoami))
            .route("/api/books", post(books::create))
            .route("/api/books/:id", put(books::update).delete(books::delete))
            .route("/api/books/:id/reviews", post(reviews::create))
            .route("/api/checkout", post(checkout::create))
            .route("/api/orders", get(checkout::list))
            .route("/api/orders/:id", get(checkout::show))
            .route("/api/courses/:id/enroll", post(enrollments::enroll))
            .route("/api/enrollments", get(enrollments::list))
            .route("/api/enrollments/:id/progress", patch(enrollments::update_progress))
            .route("/api/events/:id/register", post(events::register).delete(events::cancel))
            .route("/api/reading-progress", get(reading_progress::list))
            .route("/api/reading-progress/:book_id", put(reading_progress::upsert)),
    )
}

fn admin_routes() -> Router<AppState> {
    use handlers::admin::{blog, courses, dashboard, events, orders, users};

    authenticated(
        Router::new()
            .route("/api/admin/stats", get(dashboard::stats))
            .route("/api/admin/monitoring", get(dashboard::monitoring))
            .route("/api/admin/orders", get(orders::list))
            .route("/api/admin/users", get(users::list))
            .route("/api/admin/users/:id/role", patch(users::update_role))
            .route("/api/admin/courses", post(courses::create))
            .route("/api/admin/courses/:id", put(courses::update).delete(courses::delete))
            .route("/api/admin/events", post(events::create))
            .route("/api/admin/events/:id", put(events::update).delete(events::delete))
            .route("/api/admin/events/:id/registrations", get(events::registrations))
            .route("/api/admin/blog", post(blog::create))
            .route("/api/admin/blog/:id", put(blog::update).delete(blog::delete))
            .route_layer(from_fn(middleware::require_admin)),
    )
}

fn root_routes() -> Router<AppState> {
    use handlers::root::{monitoring, tenants};

    Router::new()
        .route("/api/root/tenants", get(tenants::list).post(tenants::create))
        .route("/api/root/monitoring", get(monitoring::monitoring))
        .route_layer(from_fn(middleware::require_root))
        .route_layer(from_fn(middleware::jwt_auth_middleware))
}

/// Explicit origins from config; "*" opens CORS to any origin
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}
