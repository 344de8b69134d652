//! # Discovery Events
//!
//! The watcher's raw notifications are demultiplexed into [`Event`]s over a
//! plain [`ServiceObject`] projection, so the resolver (and its tests)
//! never touch Kubernetes API types directly.
use http::Uri;
use http::uri::InvalidUri;
use std::collections::BTreeMap;

/// Annotation naming the logical gRPC service(s) a backend provides,
/// as a comma-separated list.
pub const SERVICE_NAME_ANNOTATION: &str = "grpc-service";

/// Annotation naming the backend's service version. Optional; absence means
/// the unversioned entry (empty string).
pub const SERVICE_VERSION_ANNOTATION: &str = "grpc-service-version";

const CLUSTER_DOMAIN: &str = "cluster.local";

/// One exposed port of a watched Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub port: i32,
}

/// Projection of the orchestrator's Service representation; produced by the
/// watcher, consumed once per event, never mutated by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceObject {
    pub name: String,
    pub namespace: String,
    pub annotations: BTreeMap<String, String>,
    pub ports: Vec<PortSpec>,
}

impl ServiceObject {
    /// The comma-separated `grpc-service` annotation as a list of logical
    /// service names. `None` when the annotation is absent or empty.
    pub(crate) fn grpc_services(&self) -> Option<Vec<String>> {
        let raw = self.annotations.get(SERVICE_NAME_ANNOTATION)?;
        let names: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() { None } else { Some(names) }
    }

    pub(crate) fn version(&self) -> String {
        self.annotations
            .get(SERVICE_VERSION_ANNOTATION)
            .cloned()
            .unwrap_or_default()
    }

    /// The in-cluster address of this backend:
    /// `<name>.<namespace>.svc.cluster.local:<port>`.
    pub(crate) fn backend_address(&self, port: i32) -> Result<Uri, InvalidUri> {
        format!(
            "{}.{}.svc.{}:{}",
            self.name, self.namespace, CLUSTER_DOMAIN, port
        )
        .parse()
    }
}

/// Selects the gRPC port of a Service:
///
/// * zero ports: none
/// * exactly one port: that one
/// * several ports: the first whose name starts with `grpc`, if any
pub fn select_port(ports: &[PortSpec]) -> Option<i32> {
    match ports {
        [] => None,
        [only] => Some(only.port),
        many => many
            .iter()
            .find(|p| p.name.starts_with("grpc"))
            .map(|p| p.port),
    }
}

/// The kind of change a watcher notification reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// A single demultiplexed watcher notification. `old` is present only for
/// updates and carries the object's previous state.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub new: ServiceObject,
    pub old: Option<ServiceObject>,
}
