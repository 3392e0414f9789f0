//! Payment gateway client.
//!
//! The gateway is the only network egress in the core: it creates remote
//! payment orders and nothing else. The client is constructed once at
//! startup and injected, never held as global state.

pub mod client;
pub mod error;

pub use client::{GatewayClient, GatewayOrder, HttpGatewayClient, OrderRequest};
pub use error::GatewayError;
