//! Built-in apps for the Fire TV app-state runtime.
//!
//! Both classes live under the `twitch_firetvappstate` module:
//! [`HandshakeApp`] provisions ADB key material and verifies the device link
//! once; [`TwitchPlaybackApp`] polls the device and publishes Twitch focus,
//! playback, and channel entities.

#![warn(missing_docs, clippy::pedantic)]

mod handshake;
pub mod parse;
mod playback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use appstate_kernel::{AppError, AppRegistry};

pub use handshake::{HandshakeApp, HandshakeFactory};
pub use playback::{TwitchPlaybackApp, TwitchPlaybackFactory};

/// Module identifier both built-in classes are registered under.
pub const MODULE: &str = "twitch_firetvappstate";

/// Returns a registry pre-loaded with both built-in factories.
#[must_use]
pub fn builtin_registry() -> AppRegistry {
    let mut registry = AppRegistry::new();
    registry
        .register(Arc::new(HandshakeFactory))
        .expect("builtin factories are unique");
    registry
        .register(Arc::new(TwitchPlaybackFactory))
        .expect("builtin factories are unique");
    registry
}

pub(crate) fn device_error(err: appstate_adb::AdbError) -> AppError {
    AppError::device(err.to_string())
}

/// `key` -> `key.pub`, preserving any existing extension.
pub(crate) fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(extension);
    PathBuf::from(os)
}

/// Expands a leading `~/` against `$HOME`.
pub(crate) fn expand_tilde(path: PathBuf) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path;
    };
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_resolves_both_classes() {
        let registry = builtin_registry();
        assert!(registry.resolve(MODULE, "Handshake").is_ok());
        assert!(registry.resolve(MODULE, "TwitchPlayback").is_ok());
        assert!(registry.resolve(MODULE, "Other").is_err());
    }

    #[test]
    fn append_extension_keeps_existing_suffix() {
        assert_eq!(
            append_extension(Path::new("/config/apps/firetvappstate.key"), "pub"),
            PathBuf::from("/config/apps/firetvappstate.key.pub")
        );
        assert_eq!(
            append_extension(Path::new("/config/adbkey"), "pub"),
            PathBuf::from("/config/adbkey.pub")
        );
    }

    #[test]
    fn tilde_expansion_uses_home() {
        let home = std::env::var_os("HOME");
        if let Some(home) = home {
            assert_eq!(
                expand_tilde(PathBuf::from("~/keys/adbkey")),
                PathBuf::from(home).join("keys/adbkey")
            );
        }
        assert_eq!(
            expand_tilde(PathBuf::from("/absolute/adbkey")),
            PathBuf::from("/absolute/adbkey")
        );
    }
}
