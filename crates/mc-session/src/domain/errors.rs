//! # Domain Errors
//!
//! Error types for the session core. Every variant carries a stable
//! machine code that the bridge hands to its consumer.

use thiserror::Error;

/// Session error types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Missing or malformed request parameters.
    #[error("{0}")]
    InvalidParams(String),

    /// No usable client is registered under the address.
    #[error("{0}")]
    NotFound(String),

    /// The seed could not be turned into an account.
    #[error("new account fail: {0}")]
    AccountCreateFailed(String),

    /// No subclient could be connected during creation.
    #[error("client create fail: {0}")]
    ClientCreateFailed(String),

    /// None of the disconnected subclients could be re-established.
    #[error("reconnect fail: {0}")]
    ReconnectFailed(String),

    /// A single dial or transmission failed; retrying may help.
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// No subclient managed to transmit the message.
    #[error("send fail: {0}")]
    SendFailed(String),

    /// Topic fan-out failed.
    #[error("publish fail: {0}")]
    PublishFailed(String),

    /// A reply was not received in time.
    #[error("{0}")]
    Timeout(String),

    /// The event stream ended because the client was closed.
    #[error("stream terminated")]
    StreamTerminated,

    /// Chain RPC failure.
    #[error("chain error: {0}")]
    ChainError(String),
}

impl SessionError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams(_) => "INVALID_PARAMS",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AccountCreateFailed(_) => "ACCOUNT_CREATE_FAILED",
            Self::ClientCreateFailed(_) => "CLIENT_CREATE_FAILED",
            Self::ReconnectFailed(_) => "RECONNECT_FAILED",
            Self::TransientNetwork(_) => "TRANSIENT_NETWORK",
            Self::SendFailed(_) => "SEND_FAILED",
            Self::PublishFailed(_) => "PUBLISH_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::StreamTerminated => "STREAM_TERMINATED",
            Self::ChainError(_) => "CHAIN_ERROR",
        }
    }

    /// Whether the operation may succeed if retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    /// "params error".
    pub(crate) fn params() -> Self {
        Self::InvalidParams("params error".to_string())
    }

    /// "client is closed".
    pub(crate) fn client_closed() -> Self {
        Self::NotFound("client is closed".to_string())
    }
}
