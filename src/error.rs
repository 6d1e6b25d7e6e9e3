//! Error types for the transaction pipeline

use std::time::Duration;
use thiserror::Error;

/// Failure of a single send or call operation.
///
/// Every stage short-circuits on the first error; nothing is retried and no
/// partially resolved state (a fetched nonce, an estimate) is exposed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Interface lookup error: {0}")]
    InterfaceLookup(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Remote query {query} failed: {message}")]
    RemoteQuery { query: &'static str, message: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Broadcast rejected by node: {0}")]
    Broadcast(String),

    #[error("Contract call failed: {0}")]
    Call(String),

    #[error("Timeout waiting for {operation} after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl PipelineError {
    /// True when the failure happened before anything was sent to the node
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_)
                | PipelineError::InterfaceLookup(_)
                | PipelineError::Encoding(_)
                | PipelineError::Signing(_)
        )
    }
}

/// Error reported by the remote node, message kept verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct NodeError {
    pub message: String,
}

impl NodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<alloy::transports::TransportError> for NodeError {
    fn from(error: alloy::transports::TransportError) -> Self {
        Self::new(error.to_string())
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
