//! # Server Reflection
//!
//! The gateway compiles no `.proto` files; every call is self-describing.
//! This module talks the gRPC Server Reflection Protocol (`grpc.reflection.v1`)
//! to the selected backend and turns its answers into `prost-reflect`
//! descriptors the data plane can invoke against.
pub mod client;
