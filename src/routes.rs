// src/routes.rs

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, exam},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (exams, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + grading queue).
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

    let exam_routes = Router::new()
        .route("/{id}/start", post(exam::start_exam))
        .route("/{id}/questions", get(exam::get_questions))
        .route("/{id}/submit", post(exam::submit_exam))
        .route("/{id}/result", get(exam::get_result))
        .route("/{id}/leaderboard", get(exam::get_leaderboard));

    // Auth middleware is owned by the gateway in front of this service, so
    // the admin routes carry no extra layers here.
    let admin_routes = Router::new()
        .route("/exams", post(admin::create_exam))
        .route("/exams/{id}/publish", post(admin::publish_exam));

    Router::new()
        .nest("/api/exams", exam_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
