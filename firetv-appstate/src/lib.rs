//! Fire TV app-state runtime facade.
//!
//! Depend on this crate to get the whole runtime; the internal crates sit
//! behind feature flags so embedders can trim what they do not need (e.g.
//! only the ADB client, or only the config schema).

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use appstate_primitives as primitives;

/// `apps.yaml` schema and loader (enabled by the `config` feature).
#[cfg(feature = "config")]
pub use appstate_config as config;

/// ADB wire protocol and device client (enabled by the `adb` feature).
#[cfg(feature = "adb")]
pub use appstate_adb as adb;

/// Entity state bus (enabled by the `entities` feature).
#[cfg(feature = "entities")]
pub use appstate_entities as entities;

/// Registry, lifecycle, and supervisor (enabled by the `kernel` feature).
#[cfg(feature = "kernel")]
pub use appstate_kernel as kernel;

/// Built-in Handshake and TwitchPlayback apps (enabled by the `apps` feature).
#[cfg(feature = "apps")]
pub use appstate_apps as apps;
