//! Error types surfaced by the public SDK calls
//!
//! Only caller-facing failures live here. Problems with received messages are
//! never raised; the dispatcher logs and counts them instead.

use crate::config::ConfigError;
use crate::protocol::ValidationError;
use crate::transport::BrokerError;
use std::time::Duration;
use thiserror::Error;

/// Main error type for agent client operations
#[derive(Debug, Error)]
pub enum AgentError {
    /// A parameter failed validation; nothing was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),

    #[error("Transport error: {0}")]
    Transport(#[from] BrokerError),

    #[error("Failed to encode message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Timed out after {0:?} waiting for broker connection")]
    ConnectionTimeout(Duration),
}

impl AgentError {
    /// True for errors raised before any network action
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, AgentError::InvalidArgument(_))
    }
}

/// Result type for agent client operations
pub type AgentResult<T> = Result<T, AgentError>;
