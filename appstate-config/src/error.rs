//! Configuration error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced while loading or validating `apps.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not match the schema.
    #[error("malformed apps.yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A structurally valid entry carries an unusable value.
    #[error("invalid app `{app}`: {reason}")]
    Invalid {
        /// The app instance name.
        app: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}

impl ConfigError {
    /// Convenience constructor for validation failures.
    #[must_use]
    pub fn invalid(app: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            app: app.into(),
            reason: reason.into(),
        }
    }
}
