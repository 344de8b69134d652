//! # Stub
//!
//! Performs the unary RPC described by a [`MethodInvocation`] and
//! translates every failure mode onto the gateway taxonomy:
//!
//! * transport unavailable -> `UpstreamConnFailure`
//! * any other gRPC status -> `Grpc` (passed through to the client)
//! * a success payload that does not decode as the method's output type ->
//!   `Unknown` (a backend bug, not a client error)
use crate::BoxError;
use crate::error::GatewayError;
use crate::metadata::Metadata;
use crate::proxy::codec::DynamicCodec;
use crate::proxy::invocation::MethodInvocation;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::str::FromStr;
use tonic::transport::Channel;
use tonic::{Code, client::GrpcService};

/// A dynamic unary-call stub over a single backend connection.
pub struct Stub<S = Channel> {
    grpc: tonic::client::Grpc<S>,
}

impl<S> Stub<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            grpc: tonic::client::Grpc::new(service),
        }
    }

    /// Invokes the unary RPC, propagating `metadata` as request metadata.
    ///
    /// On success, returns the output message together with the response
    /// header metadata the backend sent.
    pub async fn invoke(
        &mut self,
        invocation: MethodInvocation,
        metadata: &Metadata,
    ) -> Result<(DynamicMessage, Metadata), GatewayError> {
        self.grpc.ready().await.map_err(|err| {
            let err: crate::BoxError = err.into();
            GatewayError::UpstreamConnFailure(format!(
                "could not connect to backend gRPC service: {err}"
            ))
        })?;

        let path = rpc_path(&invocation.method);
        let output_type = invocation.method.output();

        let mut request = tonic::Request::new(invocation.input);
        *request.metadata_mut() = metadata.to_metadata_map();

        let response = match self.grpc.unary(request, path, DynamicCodec).await {
            Ok(response) => response,
            Err(status) if status.code() == Code::Unavailable => {
                return Err(GatewayError::UpstreamConnFailure(
                    "could not connect to backend gRPC service".to_string(),
                ));
            }
            Err(status) => {
                return Err(GatewayError::Grpc {
                    code: status.code() as i32,
                    message: status.message().to_string(),
                    details: vec![],
                });
            }
        };

        let response_metadata = Metadata::from_metadata_map(response.metadata());
        let raw = response.into_inner();
        let output = DynamicMessage::decode(output_type, raw).map_err(|_| {
            GatewayError::Unknown(
                "response from backend could not be converted internally; this is a bug"
                    .to_string(),
            )
        })?;

        Ok((output, response_metadata))
    }
}

fn rpc_path(method: &MethodDescriptor) -> http::uri::PathAndQuery {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path).expect("valid gRPC path")
}
