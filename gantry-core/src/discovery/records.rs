//! # Record Table
//!
//! `Records` maps a logical gRPC service name to the backends that provide
//! it, one address list per version. The empty version string is a valid
//! key and means "unversioned".
//!
//! An entry is resolvable only while its address list holds exactly one
//! address; observing more than one backend for the same `(service,
//! version)` pair makes the entry undecidable until the duplicates go away.
use crate::error::GatewayError;
use http::Uri;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::RwLock;

type Versions = HashMap<String, Vec<Uri>>;

/// Thread-safe mapping from `service -> version -> [address]`.
///
/// A single read-write lock protects the table: the control loop takes it
/// exclusively for mutations, request workers take it shared for lookups.
#[derive(Debug, Default)]
pub struct Records {
    table: RwLock<HashMap<String, Versions>>,
}

fn service_unresolvable(service: &str) -> GatewayError {
    GatewayError::ServiceUnresolvable(format!("The gRPC service {service} is unresolvable"))
}

fn version_unresolvable(service: &str, version: &str) -> GatewayError {
    GatewayError::ServiceUnresolvable(format!(
        "Version {version} of the gRPC service {service} is unresolvable"
    ))
}

fn version_not_specified(service: &str) -> GatewayError {
    GatewayError::VersionNotSpecified(format!(
        "There are multiple version of the gRPC service {service} available. You must specify one"
    ))
}

fn version_undecidable(service: &str) -> GatewayError {
    GatewayError::VersionUndecidable(format!(
        "Multiple possible backends found for the gRPC service {service}. \
         Add annotations to distinguish versions"
    ))
}

impl Records {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the backend address for the `(service, version)` pair.
    ///
    /// With an empty version, the lookup succeeds only when the service has
    /// exactly one version entry; with more it fails with
    /// `VersionNotSpecified`. Any entry holding more than one address fails
    /// with `VersionUndecidable`.
    pub fn get(&self, service: &str, version: &str) -> Result<Uri, GatewayError> {
        let table = self.table.read().unwrap();
        let Some(versions) = table.get(service) else {
            return Err(service_unresolvable(service));
        };
        if version.is_empty() {
            if versions.len() != 1 {
                return Err(version_not_specified(service));
            }
            // This reads the sole entry, whatever its version key is.
            let entries = versions.values().next().unwrap();
            if entries.len() != 1 {
                return Err(version_undecidable(service));
            }
            return Ok(entries[0].clone());
        }
        let Some(entries) = versions.get(version) else {
            return Err(version_unresolvable(service, version));
        };
        if entries.len() != 1 {
            return Err(version_undecidable(service));
        }
        Ok(entries[0].clone())
    }

    /// Registers a backend address for the `(service, version)` pair.
    ///
    /// Appends to the entry's address list unless the exact address
    /// (compared by its full string form) is already present.
    pub fn set(&self, service: &str, version: &str, address: &Uri) {
        let mut table = self.table.write().unwrap();
        let entries = table
            .entry(service.to_string())
            .or_default()
            .entry(version.to_string())
            .or_default();
        if !entries.iter().any(|e| e.to_string() == address.to_string()) {
            entries.push(address.clone());
        }
    }

    /// Removes a backend address; empty entries and services collapse away.
    pub fn remove(&self, service: &str, version: &str, address: &Uri) {
        let mut table = self.table.write().unwrap();
        let Some(versions) = table.get_mut(service) else {
            return;
        };
        let Some(entries) = versions.get_mut(version) else {
            return;
        };
        entries.retain(|e| e.to_string() != address.to_string());
        if entries.is_empty() {
            versions.remove(version);
        }
        if versions.is_empty() {
            table.remove(service);
        }
    }

    /// True iff the `(service, version)` entry holds at least one address.
    pub fn exists(&self, service: &str, version: &str) -> bool {
        let table = self.table.read().unwrap();
        table
            .get(service)
            .and_then(|versions| versions.get(version))
            .is_some_and(|entries| !entries.is_empty())
    }

    /// Replaces the table with an empty one.
    pub fn clear(&self) {
        let mut table = self.table.write().unwrap();
        *table = HashMap::new();
    }

    /// A JSON snapshot of the table, for the debug endpoint.
    pub fn to_json(&self) -> Value {
        let table = self.table.read().unwrap();
        let services: serde_json::Map<String, Value> = table
            .iter()
            .map(|(service, versions)| {
                let versions: serde_json::Map<String, Value> = versions
                    .iter()
                    .map(|(version, entries)| {
                        let addresses: Vec<Value> =
                            entries.iter().map(|e| json!(e.to_string())).collect();
                        (version.clone(), Value::Array(addresses))
                    })
                    .collect();
                (service.clone(), Value::Object(versions))
            })
            .collect();
        json!({ "grpc_service": services })
    }
}
