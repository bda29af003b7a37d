//! Registry resolving `module`/`class` pairs to app factories.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use appstate_config::AppSpec;
use appstate_primitives::AppId;
use thiserror::Error;

use crate::{App, AppResult};

/// Trait implemented by anything that can build an app class.
pub trait AppFactory: Send + Sync {
    /// Module identifier this factory belongs to.
    fn module(&self) -> &str;

    /// Class identifier within the module.
    fn class(&self) -> &str;

    /// Builds an app instance from its configuration entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Config`] when required options are missing
    /// or unusable.
    fn build(&self, app_id: &AppId, spec: &AppSpec) -> AppResult<Box<dyn App>>;
}

/// Errors surfaced by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A factory for this `module`/`class` pair is already registered.
    #[error("duplicate factory for {module}.{class}")]
    Duplicate {
        /// Module identifier.
        module: String,
        /// Class identifier.
        class: String,
    },

    /// No factory exists under the requested module.
    #[error("unknown module `{module}`")]
    UnknownModule {
        /// The unresolvable module identifier.
        module: String,
    },

    /// The module exists but has no such class.
    #[error("module `{module}` has no class `{class}`")]
    UnknownClass {
        /// Module identifier.
        module: String,
        /// The unresolvable class identifier.
        class: String,
    },
}

/// Maps `(module, class)` to an app factory.
#[derive(Default)]
pub struct AppRegistry {
    factories: HashMap<(String, String), Arc<dyn AppFactory>>,
}

impl fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRegistry")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AppRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under its `module`/`class` pair.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the pair is already taken.
    pub fn register(&mut self, factory: Arc<dyn AppFactory>) -> Result<(), RegistryError> {
        let key = (factory.module().to_owned(), factory.class().to_owned());
        if self.factories.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                module: key.0,
                class: key.1,
            });
        }
        self.factories.insert(key, factory);
        Ok(())
    }

    /// Resolves a configuration entry's `module`/`class` pair.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownModule`] when no factory lives under
    /// the module and [`RegistryError::UnknownClass`] when the module exists
    /// but lacks the class.
    pub fn resolve(&self, module: &str, class: &str) -> Result<Arc<dyn AppFactory>, RegistryError> {
        if let Some(factory) = self.factories.get(&(module.to_owned(), class.to_owned())) {
            return Ok(Arc::clone(factory));
        }
        if self.factories.keys().any(|(m, _)| m == module) {
            return Err(RegistryError::UnknownClass {
                module: module.to_owned(),
                class: class.to_owned(),
            });
        }
        Err(RegistryError::UnknownModule {
            module: module.to_owned(),
        })
    }

    /// Returns the number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` when no factories are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::{AppContext, Schedule};

    use super::*;

    struct NoopApp;

    #[async_trait]
    impl App for NoopApp {
        fn schedule(&self) -> Schedule {
            Schedule::Once
        }

        async fn tick(&mut self, _ctx: &AppContext) -> AppResult<()> {
            Ok(())
        }
    }

    struct NoopFactory {
        module: &'static str,
        class: &'static str,
    }

    impl AppFactory for NoopFactory {
        fn module(&self) -> &str {
            self.module
        }

        fn class(&self) -> &str {
            self.class
        }

        fn build(&self, _app_id: &AppId, _spec: &AppSpec) -> AppResult<Box<dyn App>> {
            Ok(Box::new(NoopApp))
        }
    }

    fn registry() -> AppRegistry {
        let mut registry = AppRegistry::new();
        registry
            .register(Arc::new(NoopFactory {
                module: "twitch_firetvappstate",
                class: "Handshake",
            }))
            .unwrap();
        registry
    }

    #[test]
    fn resolves_registered_pairs() {
        let registry = registry();
        let factory = registry.resolve("twitch_firetvappstate", "Handshake").unwrap();
        assert_eq!(factory.class(), "Handshake");
    }

    #[test]
    fn distinguishes_unknown_module_from_unknown_class() {
        let registry = registry();

        let err = registry.resolve("no_such_module", "Handshake").err().unwrap();
        assert!(matches!(err, RegistryError::UnknownModule { .. }));

        let err = registry
            .resolve("twitch_firetvappstate", "NoSuchClass")
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::UnknownClass { .. }));
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = registry();
        let err = registry
            .register(Arc::new(NoopFactory {
                module: "twitch_firetvappstate",
                class: "Handshake",
            }))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
    }
}
