//! Router assembly: common routes, generated entity routes, OpenAPI document, middleware stack.

mod common;
mod entity;

pub use common::{common_routes, log_requests};
pub use entity::entity_routes;

use crate::envelope::envelope;
use crate::openapi::openapi_routes;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware, Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};

/// Request bodies above this are rejected with 413 before reaching a handler.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Browsers may call the API from any origin. Preflight answers are cached for ten minutes.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(600))
}

/// Entity routes live under `prefix` (e.g. "/api/v1"; "" or "/" mounts them at the root).
/// Layers, outermost first: CORS, request log, envelope, body limit.
pub fn build_app(state: AppState, prefix: &str) -> Router {
    let prefix = prefix.trim_end_matches('/');
    let entities = entity_routes(&state.registry);
    let api = if prefix.is_empty() {
        Router::new().merge(entities)
    } else {
        Router::new().nest(prefix, entities)
    };
    Router::new()
        .merge(common_routes())
        .merge(api)
        .merge(openapi_routes(&state.registry, prefix))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer())
                .layer(middleware::from_fn(log_requests))
                .layer(middleware::from_fn(envelope)),
        )
        .with_state(state)
}
