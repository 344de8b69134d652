//! # Error Taxonomy
//!
//! Every failure the gateway can produce is collapsed into [`GatewayError`],
//! which carries a stable kind, a human-readable message, and a fixed HTTP
//! mapping. Two JSON wire shapes exist:
//!
//! * Internal errors: `{"status": <http code>, "message": <string>}`.
//! * Upstream gRPC errors: `{"code": <grpc code>, "message": <string>}`,
//!   plus a `details` array when the upstream attached any.
use http::StatusCode;
use serde_json::{Value, json};
use tonic::Code;

/// Errors surfaced at the gateway's request boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// The backend could not be reached (dial failure, reset, timeout).
    #[error("{0}")]
    UpstreamConnFailure(String),

    /// The resolver has no backend for the requested service or version.
    #[error("{0}")]
    ServiceUnresolvable(String),

    /// The backend was reached but does not expose the requested service.
    #[error("{0}")]
    ServiceNotFound(String),

    /// The backend exposes the service but not the requested method.
    #[error("{0}")]
    MethodNotFound(String),

    /// The request JSON does not match the method's input message type.
    #[error("{0}")]
    MessageTypeMismatch(String),

    /// Multiple versions exist and the caller did not pick one.
    #[error("{0}")]
    VersionNotSpecified(String),

    /// More than one backend is registered for the `(service, version)` pair.
    #[error("{0}")]
    VersionUndecidable(String),

    /// Residual internal failures.
    #[error("{0}")]
    Unknown(String),

    /// A gRPC status returned by the upstream, passed through verbatim.
    #[error("upstream returned gRPC status {code}: {message}")]
    Grpc {
        code: i32,
        message: String,
        details: Vec<Value>,
    },
}

impl GatewayError {
    /// The HTTP status this error maps to at the wire.
    pub fn http_status(&self) -> StatusCode {
        match self {
            GatewayError::UpstreamConnFailure(_) => StatusCode::BAD_GATEWAY,
            GatewayError::ServiceUnresolvable(_) => StatusCode::NOT_FOUND,
            GatewayError::ServiceNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::MethodNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::MessageTypeMismatch(_) => StatusCode::BAD_REQUEST,
            GatewayError::VersionNotSpecified(_) => StatusCode::BAD_REQUEST,
            GatewayError::VersionUndecidable(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Grpc { code, .. } => http_status_from_grpc(Code::from_i32(*code)),
        }
    }

    /// The JSON body written alongside [`GatewayError::http_status`].
    pub fn wire_body(&self) -> Value {
        match self {
            GatewayError::Grpc {
                code,
                message,
                details,
            } => {
                let mut body = json!({
                    "code": code,
                    "message": message,
                });
                if !details.is_empty() {
                    body["details"] = Value::Array(details.clone());
                }
                body
            }
            other => json!({
                "status": other.http_status().as_u16(),
                "message": other.to_string(),
            }),
        }
    }
}

/// The well-known gRPC code to HTTP status table.
fn http_status_from_grpc(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::REQUEST_TIMEOUT,
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::SERVICE_UNAVAILABLE,
        Code::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
