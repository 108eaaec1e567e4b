// src/routes.rs

use std::time::Duration;

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, results, survey},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, identity_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, survey, admin).
/// * Applies global middleware (Trace, CORS, Timeout).
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Public survey routes serve anonymous callers; identity is injected
    // best-effort so login-required surveys can still see who is asking.
    let survey_routes = Router::new()
        .route("/detail", get(survey::detail))
        .route("/submit", post(survey::submit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    let admin_routes = Router::new()
        .route(
            "/surveys",
            get(admin::list_surveys).post(admin::create_survey),
        )
        .route(
            "/surveys/{id}",
            get(admin::get_survey)
                .put(admin::update_survey)
                .delete(admin::delete_survey),
        )
        .route("/surveys/{id}/status", put(admin::set_status))
        .route("/results", get(results::list_results))
        .route("/results/stats", get(results::stats))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/survey", survey_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::new(Duration::from_secs(15)))
        .with_state(state)
}
