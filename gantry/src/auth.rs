//! # Access Token Middleware
//!
//! When a token is configured, every request passing through this layer
//! must present it as `X-Access-Token`. Failures answer 401 with an empty
//! body. The liveness probe is mounted outside the layer and stays open.
use crate::server::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::info;

pub async fn require_access_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.access_token.is_empty() {
        return next.run(request).await;
    }
    let provided = request
        .headers()
        .get("x-access-token")
        .and_then(|value| value.to_str().ok());
    match provided {
        Some(token) if token == state.access_token => next.run(request).await,
        Some(_) => {
            info!(reason = "invalid token", "unauthorized");
            StatusCode::UNAUTHORIZED.into_response()
        }
        None => {
            info!(reason = "no token", "unauthorized");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
