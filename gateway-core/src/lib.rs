//! Core library for grpc-gateway: dynamic REST/JSON to gRPC transcoding.
//!
//! The gateway inspects `.proto` service definitions for `google.api.http`
//! bindings (inline options or a YAML/JSON sidecar) and registers one HTTP
//! route per binding. At request time a handler merges path captures, query
//! parameters and the JSON body into a dynamic protobuf request, invokes
//! the backend over a shared channel, projects the response through the
//! binding's body selector and serializes it back to JSON.
//!
//! Route generation lives in [`router::build_gateway`]; the pieces it
//! orchestrates are [`route`] (template compilation), [`merge`] (parameter
//! precedence), [`project`] (response projection), [`client`] (the client
//! directory and dynamic dispatch) and [`metadata`] (header conversion).

pub mod client;
pub mod codec;
pub mod connection;
pub mod descriptor;
pub mod error;
pub mod merge;
pub mod metadata;
pub mod project;
pub mod route;
pub mod router;
pub mod sidecar;

pub use error::{GatewayError, Result};
pub use router::{build_gateway, GatewayOptions};
