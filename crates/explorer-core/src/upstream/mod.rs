//! Blockchain node access.
//!
//! [`NodeRpc`] is the seam the engine depends on; [`NodeClient`] implements it over
//! JSON-RPC/HTTP with basic authentication and bounded concurrency.

pub mod errors;
pub mod http_client;
pub mod node;

pub use errors::UpstreamError;
pub use http_client::{HttpClient, HttpClientConfig};
pub use node::{BlockVerbosity, NodeClient, NodeRpc};
