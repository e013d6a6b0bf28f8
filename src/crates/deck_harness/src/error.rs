use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while talking to the deck or running a scenario.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to open {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },
    #[error("session is not open")]
    NotOpen,
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    #[error("motor channel {channel} did not return to IDLE within {timeout:?}")]
    Timeout { channel: u8, timeout: Duration },
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode run report: {0}")]
    Report(#[from] serde_json::Error),
    #[error("no serial transport compiled in (enable the `serial` feature)")]
    TransportUnavailable,
}

impl HarnessError {
    pub(crate) fn connection(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        HarnessError::Connection {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn violation(message: impl Into<String>) -> Self {
        HarnessError::ProtocolViolation(message.into())
    }

    /// True for deadline failures that an operator may fix with a longer timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            HarnessError::Timeout { .. } | HarnessError::WriteTimeout(_)
        )
    }

    /// Process exit code reported by `deck_smoke` when this error aborts a run.
    pub fn exit_code(&self) -> u8 {
        match self {
            HarnessError::TransportUnavailable => 2,
            _ => 1,
        }
    }
}
