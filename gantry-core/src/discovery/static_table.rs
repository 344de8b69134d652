//! # Static Mapping Source
//!
//! A [`Discoverer`] backed by a fixed YAML mapping instead of the cluster
//! watcher. Used by tests and local runs where no orchestrator exists.
//!
//! The mapping shape is `service -> version -> address`:
//!
//! ```yaml
//! Echo:
//!   v1: "echo-v1.demo.svc.cluster.local:5000"
//! Greeter:
//!   "": "greeter.demo.svc.cluster.local:5000"
//! ```
use crate::discovery::Discoverer;
use crate::discovery::records::Records;
use crate::error::GatewayError;
use http::Uri;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum StaticTableError {
    #[error("failed to read mapping file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse mapping file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid backend address '{address}': {source}")]
    InvalidAddress {
        address: String,
        source: http::uri::InvalidUri,
    },
}

/// Service discovery over a static `service -> version -> address` table.
pub struct StaticSource {
    records: Arc<Records>,
}

impl StaticSource {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, StaticTableError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, StaticTableError> {
        let mapping: HashMap<String, HashMap<String, String>> = serde_yaml::from_str(raw)?;
        let records = Records::new();
        for (service, versions) in &mapping {
            for (version, address) in versions {
                let address: Uri =
                    address
                        .parse()
                        .map_err(|source| StaticTableError::InvalidAddress {
                            address: address.clone(),
                            source,
                        })?;
                records.set(service, version, &address);
            }
        }
        Ok(Self {
            records: Arc::new(records),
        })
    }

    /// Builds a source around an existing record table.
    pub fn from_records(records: Arc<Records>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> Arc<Records> {
        Arc::clone(&self.records)
    }
}

impl Discoverer for StaticSource {
    fn resolve(&self, service: &str, version: &str) -> Result<Uri, GatewayError> {
        self.records.get(service, version).inspect_err(|err| {
            error!(service, version, error = %err, "failed to resolve service");
        })
    }

    fn all(&self) -> serde_json::Value {
        self.records.to_json()
    }
}
