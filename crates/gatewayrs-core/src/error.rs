//! Shared error kinds for the gateway.
//!
//! Every component-level error enum in the workspace ultimately carries one
//! of these kinds at its boundary, matching the propagation policy: list
//! operations swallow per-peer failures, point operations propagate.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("Connection failed")]
    PeerConnectFailed(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("malformed identifier: {0}")]
    BadIdentifier(String),

    #[error("upstream call failed: {0}")]
    UpstreamCallFailed(String),

    #[error("sandbox violation: {0}")]
    SandboxViolation(String),

    #[error("reverse request forward failed: {0}")]
    ReverseForwardFailed(String),

    #[error("script execution failed: {0}")]
    ScriptFailed(String),

    #[error("session closed: {0}")]
    Cancelled(String),
}

impl GatewayError {
    /// The message safe to return to a downstream caller: internal detail
    /// (stack traces, credentials, raw transport errors) is redacted for
    /// peer-connect failures, per the error handling design.
    pub fn redacted_message(&self) -> String {
        match self {
            GatewayError::PeerConnectFailed(_) => "Connection failed".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
