//! # Querywire Client
//!
//! Signed-request HTTP client core for query-style remote APIs.
//!
//! This crate contains:
//! - Numbered-member parameter serialization (`params`)
//! - Pluggable request signers (`sign`)
//! - Proxy-aware reusable transport (`transport`)
//! - Request execution with bounded retry (`client`)
//! - Response status/error decoding (`decode`)
//!
//! ## Architecture
//! - Depends on `querywire-domain` for credentials, endpoints and errors
//! - One `TransportConnection` serves many sequential requests
//! - Signers are selected from configuration at construction time

pub mod client;
pub mod config;
pub mod decode;
pub mod errors;
pub mod params;
pub mod sign;
pub mod transport;

// Re-export commonly used items
pub use client::QueryClient;
pub use config::ConnectionConfig;
pub use errors::{ClientError, ErrorCategory};
pub use sign::{RequestSigner, SignatureScheme, SignedRequest};
pub use transport::{TransportConnection, WireResponse};
