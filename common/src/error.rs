use std::time::Duration;
use thiserror::Error;

/// Errors raised by the consensus coordination layer
#[derive(Error, Debug)]
pub enum ConsensusError {
    /// The consensus service (or a probed backend) could not be reached
    #[error("Consensus service unreachable at {endpoint}: {message}")]
    ServiceUnreachable { endpoint: String, message: String },

    /// The pgraft extension is not installed on the consensus service
    #[error("pgraft extension not found on {endpoint} (run: CREATE EXTENSION pgraft;)")]
    ExtensionAbsent { endpoint: String },

    /// A healthy connection returned an error for a statement
    #[error("Consensus query failed: {message}")]
    QueryFailure { message: String },

    /// A statement succeeded but a value could not be interpreted
    #[error("Malformed {field} in consensus reply: {value:?}")]
    MalformedReply { field: &'static str, value: String },

    /// A membership change was attempted while this node is not the leader
    #[error("Only the leader can {operation}")]
    UnauthorizedMutation { operation: &'static str },

    /// A backend probe did not complete within its bound
    #[error("Probe of backend {index} ({endpoint}) timed out after {timeout:?}")]
    ProbeTimeout {
        index: usize,
        endpoint: String,
        timeout: Duration,
    },

    /// The consensus link is not initialized or its connection is gone
    #[error("Consensus link is not enabled")]
    Disabled,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ConsensusError {
    /// Only a missing extension stops the owning process
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsensusError::ExtensionAbsent { .. })
    }

    /// Errors reported by a reachable service: failed statements and unreadable values
    pub fn is_query_failure(&self) -> bool {
        matches!(
            self,
            ConsensusError::QueryFailure { .. } | ConsensusError::MalformedReply { .. }
        )
    }

    pub fn malformed(field: &'static str, value: impl Into<String>) -> Self {
        ConsensusError::MalformedReply {
            field,
            value: value.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        ConsensusError::QueryFailure {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConsensusError {
    fn from(err: config::ConfigError) -> Self {
        ConsensusError::Config {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
