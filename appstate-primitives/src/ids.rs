//! App and entity identifier types.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name of an app instance, i.e. a top-level key in `apps.yaml`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppId(String);

impl AppId {
    /// Creates an app id, validating the instance name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAppId`] when the name is empty or contains
    /// whitespace or control characters.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidAppId {
                id: name,
                reason: "name cannot be empty",
            });
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidAppId {
                id: name,
                reason: "name cannot contain whitespace or control characters",
            });
        }
        Ok(Self(name))
    }

    /// Returns the instance name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AppId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for AppId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AppId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for AppId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AppId> for String {
    fn from(value: AppId) -> Self {
        value.0
    }
}

/// Domain of a published entity.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityDomain {
    /// Free-form value sensors.
    Sensor,
    /// Two-state on/off sensors.
    BinarySensor,
}

impl EntityDomain {
    /// Returns the canonical domain prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
        }
    }
}

impl Display for EntityDomain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityDomain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sensor" => Ok(Self::Sensor),
            "binary_sensor" => Ok(Self::BinarySensor),
            other => Err(Error::InvalidEntityId {
                id: other.to_owned(),
                reason: "unknown entity domain",
            }),
        }
    }
}

/// Fully-qualified entity identifier, rendered as `domain.object_id`.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct EntityId {
    domain: EntityDomain,
    object_id: String,
}

impl EntityId {
    /// Creates an entity id from a domain and object id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntityId`] when the object id is empty or
    /// contains characters outside `[a-z0-9_]`.
    pub fn new(domain: EntityDomain, object_id: impl Into<String>) -> Result<Self> {
        let object_id = object_id.into();
        if object_id.is_empty() {
            return Err(Error::InvalidEntityId {
                id: object_id,
                reason: "object id cannot be empty",
            });
        }
        if !object_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(Error::InvalidEntityId {
                id: object_id,
                reason: "object id must match [a-z0-9_]",
            });
        }
        Ok(Self { domain, object_id })
    }

    /// Creates a `sensor.*` entity id.
    ///
    /// # Errors
    ///
    /// Propagates the validation rules of [`EntityId::new`].
    pub fn sensor(object_id: impl Into<String>) -> Result<Self> {
        Self::new(EntityDomain::Sensor, object_id)
    }

    /// Creates a `binary_sensor.*` entity id.
    ///
    /// # Errors
    ///
    /// Propagates the validation rules of [`EntityId::new`].
    pub fn binary_sensor(object_id: impl Into<String>) -> Result<Self> {
        Self::new(EntityDomain::BinarySensor, object_id)
    }

    /// Returns the entity domain.
    #[must_use]
    pub const fn domain(&self) -> EntityDomain {
        self.domain
    }

    /// Returns the object id portion.
    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (domain, object_id) = s.split_once('.').ok_or_else(|| Error::InvalidEntityId {
            id: s.to_owned(),
            reason: "expected `domain.object_id`",
        })?;
        Self::new(domain.parse()?, object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_id_accepts_yaml_keys() {
        let id = AppId::new("twitch_firetvappstate_handshake").unwrap();
        assert_eq!(id.as_str(), "twitch_firetvappstate_handshake");
    }

    #[test]
    fn app_id_rejects_whitespace() {
        assert!(AppId::new("bad name").is_err());
        assert!(AppId::new("").is_err());
    }

    #[test]
    fn entity_id_round_trips() {
        let id = EntityId::binary_sensor("firetv_twitch_playing").unwrap();
        assert_eq!(id.to_string(), "binary_sensor.firetv_twitch_playing");
        let parsed: EntityId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn entity_id_rejects_uppercase() {
        assert!(EntityId::sensor("Bad").is_err());
        assert!("light.kitchen".parse::<EntityId>().is_err());
    }
}
