//! Configuration loader.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::{AppsConfig, ConfigError, ConfigResult};

/// Loads and validates an `apps.yaml` document from disk.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read and propagates
/// parse/validation errors from [`AppsConfig::parse`].
pub fn load(path: impl AsRef<Path>) -> ConfigResult<AppsConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = AppsConfig::parse(&raw)?;
    info!(path = %path.display(), apps = config.len(), "loaded app configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "app:\n  module: m\n  class: C\n  host: h\n").unwrap();
        let config = load(file.path()).unwrap();
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load("/nonexistent/apps.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
