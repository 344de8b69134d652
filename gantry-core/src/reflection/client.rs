//! # Reflection Client
//!
//! [`ReflectionClient`] resolves service descriptors from a running backend
//! at request time. Resolving a symbol means asking the server for the file
//! defining it, chasing every transitive import the server reports, and
//! assembling the files into a [`DescriptorPool`].
//!
//! The gateway treats any failure in this exchange the same way: the
//! backend was reached but did not (usably) expose the service, which is
//! the `ServiceNotFound` kind of the error taxonomy.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::BoxError;
use crate::error::GatewayError;
use futures_util::stream::once;
use http_body::Body as HttpBody;
use prost::Message;
use prost_reflect::{DescriptorError, DescriptorPool, ServiceDescriptor};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::{Streaming, client::GrpcService};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

// The host field of reflection requests is undocumented and servers ignore
// it; send it empty.
const EMPTY_HOST: &str = "";

/// Failures of the reflection exchange itself. These never leave the
/// module: the public surface folds them into the gateway taxonomy.
#[derive(Debug, thiserror::Error)]
enum ReflectionError {
    #[error("reflection stream could not be started: {0}")]
    StreamInit(#[source] tonic::Status),

    #[error("reflection stream failed: {0}")]
    Stream(#[source] tonic::Status),

    #[error("reflection stream closed unexpectedly")]
    StreamClosed,

    #[error("reflection request channel closed")]
    RequestChannelClosed,

    #[error("server returned reflection error {code}: {message}")]
    Server { code: i32, message: String },

    #[error("unexpected reflection response: {0}")]
    Unexpected(String),

    #[error("failed to decode file descriptor: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("failed to assemble descriptor pool: {0}")]
    Descriptor(#[from] DescriptorError),
}

fn service_not_found(name: &str) -> GatewayError {
    GatewayError::ServiceNotFound(format!("service {name} was not found upstream"))
}

/// A client for the gRPC Server Reflection service of a single backend.
pub struct ReflectionClient<T = Channel> {
    inner: ServerReflectionClient<T>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Wraps a gRPC service (e.g. a connected `Channel`).
    pub fn new(service: S) -> Self {
        Self {
            inner: ServerReflectionClient::new(service),
        }
    }

    /// Resolves the descriptor for a fully-qualified service name.
    ///
    /// Every reflection-layer failure (stream setup, server-side errors,
    /// missing symbols, undecodable descriptors) surfaces as
    /// [`GatewayError::ServiceNotFound`].
    pub async fn resolve_service(&mut self, name: &str) -> Result<ServiceDescriptor, GatewayError> {
        let pool = self
            .descriptor_pool_for_symbol(name)
            .await
            .map_err(|err| {
                tracing::debug!(service = name, error = %err, "reflection lookup failed");
                service_not_found(name)
            })?;
        pool.get_service_by_name(name)
            .ok_or_else(|| service_not_found(name))
    }

    /// Lists the fully-qualified names of all services the backend exposes.
    pub async fn list_services(&mut self) -> Result<Vec<String>, GatewayError> {
        let request = ServerReflectionRequest {
            host: EMPTY_HOST.to_string(),
            message_request: Some(MessageRequest::ListServices(String::new())),
        };

        let mut responses = self
            .inner
            .server_reflection_info(once(async { request }))
            .await
            .map_err(|status| {
                GatewayError::Unknown(format!("could not list upstream services: {status}"))
            })?
            .into_inner();

        let response = next_response(&mut responses).await.map_err(|err| {
            GatewayError::Unknown(format!("could not list upstream services: {err}"))
        })?;

        match response.message_response {
            Some(MessageResponse::ListServicesResponse(list)) => {
                Ok(list.service.into_iter().map(|s| s.name).collect())
            }
            other => Err(GatewayError::Unknown(format!(
                "unexpected reflection response while listing services: {other:?}"
            ))),
        }
    }

    /// Fetches the file defining `symbol` plus its transitive imports and
    /// builds a self-contained descriptor pool out of them.
    async fn descriptor_pool_for_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<DescriptorPool, ReflectionError> {
        let (tx, rx) = mpsc::channel(16);

        let mut responses = self
            .inner
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(ReflectionError::StreamInit)?
            .into_inner();

        tx.send(request_for(MessageRequest::FileContainingSymbol(
            symbol.to_string(),
        )))
        .await
        .map_err(|_| ReflectionError::RequestChannelClosed)?;

        let mut files: HashMap<String, FileDescriptorProto> = HashMap::new();
        let mut requested: HashSet<String> = HashSet::new();
        // One response arrives per outstanding request; each file may name
        // imports we have not seen yet, which become new requests.
        let mut pending = 1usize;

        while pending > 0 {
            let response = next_response(&mut responses).await?;
            pending -= 1;

            let batch = match response.message_response {
                Some(MessageResponse::FileDescriptorResponse(r)) => r.file_descriptor_proto,
                Some(MessageResponse::ErrorResponse(e)) => {
                    return Err(ReflectionError::Server {
                        code: e.error_code,
                        message: e.error_message,
                    });
                }
                other => return Err(ReflectionError::Unexpected(format!("{other:?}"))),
            };

            for raw in batch {
                let fd = FileDescriptorProto::decode(raw.as_ref())?;
                let Some(name) = fd.name.clone() else {
                    continue;
                };
                if files.contains_key(&name) {
                    continue;
                }
                for dep in &fd.dependency {
                    if !files.contains_key(dep) && requested.insert(dep.clone()) {
                        tx.send(request_for(MessageRequest::FileByFilename(dep.clone())))
                            .await
                            .map_err(|_| ReflectionError::RequestChannelClosed)?;
                        pending += 1;
                    }
                }
                files.insert(name, fd);
            }
        }

        let set = FileDescriptorSet {
            file: files.into_values().collect(),
        };
        Ok(DescriptorPool::from_file_descriptor_set(set)?)
    }
}

fn request_for(message_request: MessageRequest) -> ServerReflectionRequest {
    ServerReflectionRequest {
        host: EMPTY_HOST.to_string(),
        message_request: Some(message_request),
    }
}

async fn next_response(
    stream: &mut Streaming<ServerReflectionResponse>,
) -> Result<ServerReflectionResponse, ReflectionError> {
    stream
        .message()
        .await
        .map_err(ReflectionError::Stream)?
        .ok_or(ReflectionError::StreamClosed)
}
