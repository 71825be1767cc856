//! Life Biotech Storefront library.
//!
//! This crate provides the storefront API as a library, allowing it to be
//! tested and reused. [`app`] assembles the full router; the binary only
//! adds configuration, telemetry and the listener.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    http::{HeaderValue, Method, Request, header},
    middleware::{from_fn, from_fn_with_state},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::StorefrontConfig;
use state::AppState;

/// CORS for the browser client.
///
/// Without a configured origin no cross-origin requests are allowed.
#[must_use]
pub fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let Some(origin) = config.cors_origin.as_deref() else {
        return CorsLayer::new();
    };

    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring invalid STOREFRONT_CORS_ORIGIN");
            CorsLayer::new()
        }
    }
}

/// Build the application router with all middleware.
///
/// Session, CORS and idle tracking only wrap `/api`; health checks stay
/// cheap. Sentry layers are outermost for full request coverage.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    let api = routes::routes()
        .layer(from_fn_with_state(
            state.clone(),
            middleware::idle_timeout_middleware,
        ))
        .layer(session_layer)
        .layer(cors_layer(state.config()));

    Router::new()
        .merge(routes::health_routes())
        .merge(api)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
