//! Core shared types for the Fire TV app-state runtime.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;
mod playback;

/// Error type and result alias shared across the runtime.
pub use error::{Error, Result};
/// Identifiers for app instances and published entities.
pub use ids::{AppId, EntityDomain, EntityId};
/// Decoded Android media-session playback state.
pub use playback::PlaybackState;
