//! Gateway error types.

use thiserror::Error;

/// Errors from the payment gateway client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, timeout, or gateway 5xx. Transient: the caller may
    /// retry with the same receipt reference.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// Gateway 4xx validation failure. Permanent: the caller must fix the
    /// request before retrying.
    #[error("gateway rejected request: {0}")]
    Rejected(String),
}
