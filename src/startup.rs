use axum::{
    body::Body,
    http::{header, HeaderName, Method, Request},
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    extractors::{USER_ID_HEADER, USER_ROLE_HEADER},
    handlers::{self, dtr_handler},
    middleware,
    openapi::ApiDoc,
};

pub fn build_router(state: Arc<crate::AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(state.config.cors_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ])
        .allow_credentials(true);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    // DTR routes
    let dtr_routes = Router::new()
        .route("/", get(dtr_handler::get_record_for_period))
        .route("/{id}", get(dtr_handler::get_record))
        .route("/{id}/summary", get(dtr_handler::get_summary))
        .route("/{id}/submit", post(dtr_handler::submit_record))
        .route("/{id}/decision", post(dtr_handler::decide_record))
        .route("/{id}/entries/{day}", put(dtr_handler::update_entry))
        .route("/{id}/entries/{day}/confirm", post(dtr_handler::confirm_entry))
        .route("/{id}/entries/{day}/status", put(dtr_handler::set_entry_status));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/dtr", dtr_routes)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(axum_middleware::from_fn(middleware::metrics_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(trace)
        .layer(cors)
        .with_state(state)
}
