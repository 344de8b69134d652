//! # Invocation Builder
//!
//! Combines reflected descriptors with the request JSON into a
//! ready-to-invoke typed message. Each step has its own failure kind:
//! unknown service, unknown method, or a body that does not fit the
//! method's input type.
use crate::BoxError;
use crate::error::GatewayError;
use crate::reflection::client::ReflectionClient;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use tonic::client::GrpcService;

/// A request-scoped pairing of a method descriptor with its materialized
/// input message; dropped after the call.
pub struct MethodInvocation {
    pub method: MethodDescriptor,
    pub input: DynamicMessage,
}

/// Resolves `service`/`method` against the backend and deserializes
/// `input_json` into the method's input type.
pub async fn create_invocation<S>(
    reflection: &mut ReflectionClient<S>,
    service: &str,
    method: &str,
    input_json: &[u8],
) -> Result<MethodInvocation, GatewayError>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    let descriptor = reflection.resolve_service(service).await?;

    let method = descriptor
        .methods()
        .find(|m| m.name() == method)
        .ok_or_else(|| {
            GatewayError::MethodNotFound(format!("the method {method} was not found"))
        })?;

    if method.is_client_streaming() || method.is_server_streaming() {
        return Err(GatewayError::Unknown(
            "streaming methods are not supported".to_string(),
        ));
    }

    let mut deserializer = serde_json::Deserializer::from_slice(input_json);
    let input =
        DynamicMessage::deserialize(method.input(), &mut deserializer).map_err(|err| {
            GatewayError::MessageTypeMismatch(format!(
                "input JSON does not match the method input type: {err}"
            ))
        })?;
    deserializer.end().map_err(|err| {
        GatewayError::MessageTypeMismatch(format!(
            "input JSON does not match the method input type: {err}"
        ))
    })?;

    Ok(MethodInvocation { method, input })
}
