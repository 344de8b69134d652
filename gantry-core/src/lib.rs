//! # Gantry Core
//!
//! `gantry-core` is the library behind the gantry gateway: a stateless
//! JSON-over-HTTP front for unary gRPC backends living in a Kubernetes
//! cluster. No Protobuf schema is compiled in; every call is resolved at
//! runtime through gRPC server reflection.
//!
//! ## Key Components
//!
//! * **[`discovery`]:** the control plane. A record table maps
//!   `(logical service, version)` pairs to backend addresses and is kept
//!   current by watching the cluster's Service objects (or by a static
//!   YAML mapping in tests).
//! * **[`reflection`]:** a client for the gRPC Server Reflection Protocol
//!   that assembles `prost-reflect` descriptor pools from a live backend.
//! * **[`proxy`]:** the data plane. Builds a dynamic invocation from the
//!   request JSON, performs the unary RPC through a custom
//!   `tonic::codec::Codec`, and serializes the response back to JSON.
//! * **[`metadata`]:** projection of `Grpc-Metadata-*` HTTP headers onto
//!   gRPC request metadata and back.
//! * **[`error`]:** the stable error taxonomy and its HTTP/JSON wire
//!   mapping.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure
//! that consumers use compatible versions of these underlying dependencies.
pub mod discovery;
pub mod error;
pub mod metadata;
pub mod proxy;
pub mod reflection;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
