//! Layered error types for the redaction engine
//!
//! Only `RedactError::Configuration` ever reaches a caller once a detection
//! pass has been requested. Oracle and payload failures are folded into a
//! `ChunkFailure` and recorded in the detection log instead.

use crate::span::truncate_chars;
use thiserror::Error;

/// Caller-visible errors
#[derive(Error, Debug)]
pub enum RedactError {
    /// Invalid configuration, raised before any oracle call is made
    #[error("invalid configuration: {reason}")]
    Configuration {
        /// What was wrong with the supplied value
        reason: String,
    },
}

impl RedactError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        RedactError::Configuration {
            reason: reason.into(),
        }
    }
}

/// Failure of a single oracle call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Credentials were rejected
    #[error("unauthorized (status {status}): check API key, token or permissions")]
    Unauthorized {
        /// Status reported by the transport
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// Non-success status from the transport
    #[error("oracle returned status {status}")]
    Status {
        /// Status reported by the transport
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// The call could not be completed
    #[error("transport error: {0}")]
    Transport(String),

    /// The call did not finish in time
    #[error("oracle call timed out after {0}s")]
    Timeout(u64),
}

impl OracleError {
    /// Status code attached to the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            OracleError::Unauthorized { status, .. } | OracleError::Status { status, .. } => {
                Some(*status)
            }
            OracleError::Transport(_) | OracleError::Timeout(_) => None,
        }
    }

    /// Response body attached to the failure, empty when there is none
    pub fn body(&self) -> &str {
        match self {
            OracleError::Unauthorized { body, .. } | OracleError::Status { body, .. } => body,
            OracleError::Transport(_) | OracleError::Timeout(_) => "",
        }
    }

    /// Same failure with its body cut to `max_chars` characters
    pub fn bounded(self, max_chars: usize) -> Self {
        match self {
            OracleError::Unauthorized { status, body } => OracleError::Unauthorized {
                status,
                body: truncate_chars(&body, max_chars),
            },
            OracleError::Status { status, body } => OracleError::Status {
                status,
                body: truncate_chars(&body, max_chars),
            },
            other => other,
        }
    }
}

/// Why a chunk contributed zero spans
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkFailure {
    /// The oracle call itself failed
    #[error("oracle call failed: {0}")]
    OracleCall(#[from] OracleError),

    /// The oracle answered but no entity payload could be decoded
    #[error("malformed oracle response")]
    MalformedResponse {
        /// Truncated raw payload
        snippet: String,
    },
}

impl ChunkFailure {
    /// Same failure with every carried payload cut to `max_chars` characters
    pub fn bounded(self, max_chars: usize) -> Self {
        match self {
            ChunkFailure::OracleCall(err) => ChunkFailure::OracleCall(err.bounded(max_chars)),
            ChunkFailure::MalformedResponse { snippet } => ChunkFailure::MalformedResponse {
                snippet: truncate_chars(&snippet, max_chars),
            },
        }
    }
}

/// Result type for caller-facing operations
pub type Result<T> = std::result::Result<T, RedactError>;
