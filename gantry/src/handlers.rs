//! # Request Handlers
//!
//! The dispatcher for `POST /v1/<service>/<method>?version=<v>`, plus the
//! liveness probe, the record-table debug dump, and the explicit catch-all
//! (explicit so the trace layer logs misses too).
use crate::server::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use gantry_core::error::GatewayError;
use gantry_core::metadata::Metadata;
use gantry_core::proxy::Proxy;
use tracing::error;

/// Returns 200 for liveness probes. Mounted as GET-only; other methods get
/// 405 from the router.
pub async fn liveness_probe() -> StatusCode {
    StatusCode::OK
}

pub async fn catch_all() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Dumps the record table as JSON.
pub async fn debug_records(State(state): State<AppState>) -> Response {
    Json(state.discoverer.all()).into_response()
}

/// Handles a unary RPC request.
pub async fn rpc_call(
    State(state): State<AppState>,
    Path((service, method)): Path<(String, String)>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let versions: Vec<&str> = query
        .iter()
        .filter(|(key, _)| key == "version")
        .map(|(_, value)| value.as_str())
        .collect();
    let version = match versions.as_slice() {
        [] => "",
        [version] => version,
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    let metadata = Metadata::from_headers(&headers);

    match call_backend(&state, &service, &method, version, &metadata, &body).await {
        Ok(response) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            response,
        )
            .into_response(),
        Err(err) => {
            error!(service = %service, method = %method, error = %err, "error in handling call");
            error_response(&err)
        }
    }
}

async fn call_backend(
    state: &AppState,
    service: &str,
    method: &str,
    version: &str,
    metadata: &Metadata,
    body: &[u8],
) -> Result<Vec<u8>, GatewayError> {
    let address = state.discoverer.resolve(service, version)?;
    // The connection belongs to this request; it closes when `proxy` drops.
    let mut proxy = Proxy::connect(&address).await?;
    let (response, _upstream_headers) = proxy.call(service, method, body, metadata).await?;
    Ok(response)
}

fn error_response(err: &GatewayError) -> Response {
    (
        err.http_status(),
        [(header::CONTENT_TYPE, "application/json")],
        err.wire_body().to_string(),
    )
        .into_response()
}
