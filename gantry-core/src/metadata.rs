//! # Metadata Projection
//!
//! HTTP clients address gRPC metadata through headers carrying the
//! `Grpc-Metadata-` prefix (the convention established by grpc-gateway).
//! Only prefixed headers cross the boundary; everything else stays on the
//! HTTP side.
use http::HeaderMap;
use std::collections::HashMap;
use std::str::FromStr;
use tonic::metadata::{KeyAndValueRef, MetadataKey, MetadataMap, MetadataValue};
use tracing::warn;

const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";

/// gRPC metadata sent to and received from the upstream backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(HashMap<String, Vec<String>>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Projects `Grpc-Metadata-*` request headers into gRPC metadata.
    ///
    /// The prefix match is case-insensitive (header names arrive
    /// lower-cased), the remaining key is lower-cased, and multi-valued
    /// headers are preserved. Values that are not valid UTF-8 are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut m = HashMap::new();
        for key in headers.keys() {
            let Some(stripped) = key.as_str().strip_prefix(METADATA_HEADER_PREFIX) else {
                continue;
            };
            if stripped.is_empty() {
                continue;
            }
            let values: Vec<String> = headers
                .get_all(key)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .map(|v| v.to_string())
                .collect();
            if !values.is_empty() {
                m.insert(stripped.to_lowercase(), values);
            }
        }
        Self(m)
    }

    /// The inverse of [`Metadata::from_headers`]: re-attaches the
    /// `Grpc-Metadata-` prefix to every key.
    pub fn to_headers(&self) -> HashMap<String, Vec<String>> {
        self.0
            .iter()
            .map(|(k, v)| (format!("Grpc-Metadata-{k}"), v.clone()))
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts into tonic's metadata map for an outgoing request.
    ///
    /// Entries tonic rejects (invalid key or value characters) are logged
    /// and skipped; the backend would never have seen them anyway.
    pub fn to_metadata_map(&self) -> MetadataMap {
        let mut md = MetadataMap::new();
        for (key, values) in &self.0 {
            let Ok(key) = MetadataKey::from_str(key) else {
                warn!(key, "skipping invalid gRPC metadata key");
                continue;
            };
            for value in values {
                match MetadataValue::from_str(value) {
                    Ok(value) => {
                        md.append(key.clone(), value);
                    }
                    Err(_) => {
                        warn!(key = %key, "skipping invalid gRPC metadata value");
                    }
                }
            }
        }
        md
    }

    /// Captures the ASCII entries of a response metadata map.
    pub fn from_metadata_map(md: &MetadataMap) -> Self {
        let mut m: HashMap<String, Vec<String>> = HashMap::new();
        for entry in md.iter() {
            if let KeyAndValueRef::Ascii(key, value) = entry
                && let Ok(value) = value.to_str()
            {
                m.entry(key.as_str().to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }
        Self(m)
    }
}
