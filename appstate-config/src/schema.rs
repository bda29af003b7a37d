//! Strongly typed `apps.yaml` schema.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use appstate_primitives::AppId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};

use crate::{ConfigError, ConfigResult};

const DEFAULT_PORT: u16 = 5555;

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Accepts the port as either an integer or a decimal string, mirroring the
/// lenient typing of hand-written YAML.
fn port_from_int_or_str<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u16),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(port) => Ok(port),
        Raw::Str(raw) => raw.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// A single app specification: the `module`/`class` pair the registry
/// resolves, the device endpoint, and every remaining key as options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppSpec {
    module: String,
    class: String,
    host: String,
    #[serde(default = "default_port", deserialize_with = "port_from_int_or_str")]
    port: u16,
    #[serde(flatten)]
    options: Mapping,
}

impl AppSpec {
    /// Creates a specification with an empty options mapping.
    #[must_use]
    pub fn new(
        module: impl Into<String>,
        class: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            module: module.into(),
            class: class.into(),
            host: host.into(),
            port,
            options: Mapping::new(),
        }
    }

    /// Adds an option key, replacing any previous value.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(Value::String(key.into()), value.into());
        self
    }

    /// Returns the module identifier.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Returns the class identifier within the module.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns the device host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the device port (5555 when omitted).
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the raw per-class options mapping.
    #[must_use]
    pub const fn options(&self) -> &Mapping {
        &self.options
    }

    /// Returns the raw option value for `key`, if present.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Returns a string option. Numbers are rendered to their decimal form so
    /// hand-written YAML may leave values unquoted.
    #[must_use]
    pub fn option_str(&self, key: &str) -> Option<String> {
        match self.option(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Returns a filesystem path option.
    #[must_use]
    pub fn option_path(&self, key: &str) -> Option<PathBuf> {
        self.option_str(key).map(PathBuf::from)
    }

    /// Returns an unsigned integer option, accepting both integers and
    /// decimal strings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the value is present but is
    /// neither a non-negative integer nor a parseable decimal string.
    pub fn option_u64(&self, app: &AppId, key: &str) -> ConfigResult<Option<u64>> {
        let Some(value) = self.option(key) else {
            return Ok(None);
        };
        match value {
            Value::Number(n) => n.as_u64().map(Some).ok_or_else(|| {
                ConfigError::invalid(app.as_str(), format!("`{key}` must be a non-negative integer"))
            }),
            Value::String(s) => s.trim().parse().map(Some).map_err(|_| {
                ConfigError::invalid(app.as_str(), format!("`{key}` must be an integer, got `{s}`"))
            }),
            _ => Err(ConfigError::invalid(
                app.as_str(),
                format!("`{key}` must be an integer"),
            )),
        }
    }

    fn validate(&self, app: &AppId) -> ConfigResult<()> {
        if self.module.trim().is_empty() {
            return Err(ConfigError::invalid(app.as_str(), "`module` cannot be empty"));
        }
        if self.class.trim().is_empty() {
            return Err(ConfigError::invalid(app.as_str(), "`class` cannot be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid(app.as_str(), "`host` cannot be empty"));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid(app.as_str(), "`port` cannot be zero"));
        }
        Ok(())
    }
}

/// The full `apps.yaml` document: instance name to specification.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppsConfig {
    apps: BTreeMap<AppId, AppSpec>,
}

impl AppsConfig {
    /// Parses and validates a YAML document. An empty document yields an
    /// empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] for malformed documents and
    /// [`ConfigError::Invalid`] for entries that parse but fail validation.
    pub fn parse(input: &str) -> ConfigResult<Self> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration back to YAML, preserving every key/value
    /// pair.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] when serialization fails.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Returns the number of configured apps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// Returns `true` when no apps are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Looks up a specification by instance name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AppSpec> {
        self.apps.get(name)
    }

    /// Iterates over all configured apps.
    pub fn iter(&self) -> impl Iterator<Item = (&AppId, &AppSpec)> {
        self.apps.iter()
    }

    fn validate(&self) -> ConfigResult<()> {
        for (app, spec) in &self.apps {
            spec.validate(app)?;
        }
        Ok(())
    }
}

impl FromStr for AppsConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        Self::parse(s)
    }
}
