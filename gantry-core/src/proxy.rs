//! # Dynamic RPC Proxy
//!
//! The data plane of the gateway. For each request, a [`Proxy`] is dialled
//! against the resolved backend, the method schema is fetched via server
//! reflection, the JSON body becomes a dynamic message, the unary call is
//! performed, and the response message is serialized back to JSON. The
//! connection belongs to the request and closes when the proxy drops.
mod codec;
pub mod invocation;
pub mod stub;

use crate::error::GatewayError;
use crate::metadata::Metadata;
use crate::reflection::client::ReflectionClient;
use http::Uri;
use invocation::create_invocation;
use stub::Stub;
use tonic::transport::{Channel, Endpoint};

/// A per-request dynamic gRPC client bound to one backend.
pub struct Proxy {
    reflection: ReflectionClient<Channel>,
    stub: Stub<Channel>,
}

impl Proxy {
    /// Dials the backend in plaintext. The address is authority-form
    /// (`host:port`); dial failures surface as `UpstreamConnFailure`.
    pub async fn connect(address: &Uri) -> Result<Self, GatewayError> {
        let endpoint = Endpoint::new(format!("http://{address}")).map_err(|err| {
            GatewayError::UpstreamConnFailure(format!(
                "invalid backend address '{address}': {err}"
            ))
        })?;
        let channel = endpoint.connect().await.map_err(|err| {
            GatewayError::UpstreamConnFailure(format!(
                "could not connect to backend gRPC service: {err}"
            ))
        })?;
        Ok(Self {
            reflection: ReflectionClient::new(channel.clone()),
            stub: Stub::new(channel),
        })
    }

    /// Performs the unary call after reflecting the method schema from the
    /// backend. Returns the response body as JSON bytes together with the
    /// backend's response header metadata.
    pub async fn call(
        &mut self,
        service: &str,
        method: &str,
        input_json: &[u8],
        metadata: &Metadata,
    ) -> Result<(Vec<u8>, Metadata), GatewayError> {
        let invocation = create_invocation(&mut self.reflection, service, method, input_json).await?;
        let (output, response_metadata) = self.stub.invoke(invocation, metadata).await?;
        let body = serde_json::to_vec(&output).map_err(|_| {
            GatewayError::Unknown("could not marshal backend response into JSON".to_string())
        })?;
        Ok((body, response_metadata))
    }
}
