//! # Service Discovery
//!
//! The control plane of the gateway: a [`records::Records`] table mapping
//! `(logical service, version)` to backend addresses, kept current by a
//! source: either the Kubernetes watcher ([`kubernetes::ServiceSource`])
//! or a static YAML mapping ([`static_table::StaticSource`]).
pub mod event;
pub mod kubernetes;
pub mod records;
pub mod static_table;

use crate::error::GatewayError;
use http::Uri;

/// Name resolution for logical gRPC services.
///
/// The data plane holds a `dyn Discoverer` and never cares which source
/// keeps the table current.
pub trait Discoverer: Send + Sync {
    /// Resolves the backend address providing `(service, version)`.
    /// An empty version means "unversioned"; see
    /// [`records::Records::get`] for the disambiguation rules.
    fn resolve(&self, service: &str, version: &str) -> Result<Uri, GatewayError>;

    /// A JSON snapshot of every known record, for debugging.
    fn all(&self) -> serde_json::Value;
}
