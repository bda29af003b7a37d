//! Android media-session playback state.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Decoded `PlaybackState {state=N}` value from `dumpsys media_session`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum PlaybackState {
    /// State 1: stopped, idle, or sitting in a menu.
    Stopped,
    /// State 3: actively playing.
    Playing,
    /// State 6: transition between streams (observed in the wild).
    Transitioning,
    /// Any other state integer Android may report.
    Other(u32),
}

impl PlaybackState {
    /// Decodes the raw media-session state integer.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Stopped,
            3 => Self::Playing,
            6 => Self::Transitioning,
            other => Self::Other(other),
        }
    }

    /// Returns the raw state integer.
    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::Stopped => 1,
            Self::Playing => 3,
            Self::Transitioning => 6,
            Self::Other(raw) => raw,
        }
    }

    /// Returns `true` when media is actively playing.
    #[must_use]
    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl From<u32> for PlaybackState {
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<PlaybackState> for u32 {
    fn from(state: PlaybackState) -> Self {
        state.raw()
    }
}

impl Display for PlaybackState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Playing => f.write_str("playing"),
            Self::Transitioning => f.write_str("transitioning"),
            Self::Other(raw) => write!(f, "state_{raw}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trips() {
        for raw in [0, 1, 2, 3, 6, 7, 42] {
            assert_eq!(PlaybackState::from_raw(raw).raw(), raw);
        }
    }

    #[test]
    fn playing_is_state_three() {
        assert!(PlaybackState::from_raw(3).is_playing());
        assert!(!PlaybackState::from_raw(1).is_playing());
        assert!(!PlaybackState::from_raw(6).is_playing());
    }
}
