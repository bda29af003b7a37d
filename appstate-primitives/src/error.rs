//! Shared error definitions for runtime primitives.

use thiserror::Error;

/// Result alias used throughout the runtime.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The app instance name failed validation.
    #[error("invalid app id `{id}`: {reason}")]
    InvalidAppId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: &'static str,
    },

    /// The entity object id failed validation.
    #[error("invalid entity id `{id}`: {reason}")]
    InvalidEntityId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: &'static str,
    },
}
