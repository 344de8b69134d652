//! # HTTP Server
//!
//! Route table:
//!
//! | Path | Method | Auth |
//! |---|---|---|
//! | `/healthz` | GET | none |
//! | `/v1/{service}/{method}` | POST | `X-Access-Token` |
//! | `/debug/records` | GET | `X-Access-Token` |
//! | anything else | any | `X-Access-Token`, then 404 |
use crate::{auth, handlers};
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use gantry_core::discovery::Discoverer;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub discoverer: Arc<dyn Discoverer>,
    pub access_token: String,
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/{service}/{method}", post(handlers::rpc_call))
        .route("/debug/records", get(handlers::debug_records))
        .fallback(handlers::catch_all)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_access_token,
        ));

    Router::new()
        .route("/healthz", get(handlers::liveness_probe))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod integration_test;
