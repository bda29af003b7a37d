//! Entity state values.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The state portion of a published entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// Free-form text state.
    Text(String),
    /// Integer state (e.g. a raw playback state).
    Integer(i64),
    /// Binary-sensor state, rendered `on`/`off`.
    OnOff(bool),
    /// State could not be determined.
    Unknown,
}

impl StateValue {
    /// Renders the state as the JSON value it is published as.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Integer(n) => Value::from(*n),
            Self::OnOff(on) => Value::String(if *on { "on" } else { "off" }.to_owned()),
            Self::Unknown => Value::String("unknown".to_owned()),
        }
    }

    /// Returns `true` for `OnOff(true)`.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::OnOff(true))
    }
}

impl Display for StateValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(n) => write!(f, "{n}"),
            Self::OnOff(true) => f.write_str("on"),
            Self::OnOff(false) => f.write_str("off"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::OnOff(value)
    }
}

/// A published entity: current value, attributes, and update time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Current state value.
    pub value: StateValue,
    /// Free-form attribute map published alongside the state.
    pub attributes: Map<String, Value>,
    /// When the state was last written.
    pub updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_like_published_states() {
        assert_eq!(StateValue::OnOff(true).to_string(), "on");
        assert_eq!(StateValue::OnOff(false).to_string(), "off");
        assert_eq!(StateValue::Unknown.to_string(), "unknown");
        assert_eq!(StateValue::Integer(3).to_string(), "3");
    }

    #[test]
    fn json_value_keeps_integer_states_numeric() {
        assert_eq!(StateValue::Integer(3).to_value(), Value::from(3));
        assert_eq!(
            StateValue::OnOff(true).to_value(),
            Value::String("on".to_owned())
        );
    }

    #[test]
    fn only_on_is_on() {
        assert!(StateValue::OnOff(true).is_on());
        assert!(!StateValue::OnOff(false).is_on());
        assert!(!StateValue::Text("on".to_owned()).is_on());
    }
}
