//! Error type shared by the ADB client.

use thiserror::Error;

/// Result alias used by the ADB client.
pub type AdbResult<T> = Result<T, AdbError>;

/// Errors surfaced by the ADB transport and auth layers.
#[derive(Debug, Error)]
pub enum AdbError {
    /// Underlying socket or filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation exceeded its deadline.
    #[error("timed out during {op}")]
    Timeout {
        /// The operation that timed out.
        op: &'static str,
    },

    /// The peer violated the wire protocol.
    #[error("protocol violation: {reason}")]
    Protocol {
        /// Additional context about the violation.
        reason: String,
    },

    /// The device rejected or aborted authentication.
    #[error("authentication failed: {reason}")]
    Auth {
        /// Additional context about the failure.
        reason: String,
    },

    /// Key material could not be generated, loaded, or encoded.
    #[error("key material error: {reason}")]
    Key {
        /// Additional context about the failure.
        reason: String,
    },
}

impl AdbError {
    /// Convenience constructor for timeouts.
    #[must_use]
    pub const fn timeout(op: &'static str) -> Self {
        Self::Timeout { op }
    }

    /// Convenience constructor for protocol violations.
    #[must_use]
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for authentication failures.
    #[must_use]
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for key material failures.
    #[must_use]
    pub fn key(reason: impl Into<String>) -> Self {
        Self::Key {
            reason: reason.into(),
        }
    }
}
