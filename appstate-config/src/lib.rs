//! Configuration for the Fire TV app-state runtime.
//!
//! Apps are declared in an `apps.yaml` document mapping instance names to
//! specifications. Each specification carries the `module`/`class` pair the
//! registry resolves plus the device endpoint; every remaining key flows into
//! a per-class options mapping.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::load;
pub use schema::{AppSpec, AppsConfig};
