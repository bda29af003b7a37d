//! App runtime kernel.
//!
//! The kernel turns a validated `apps.yaml` into running apps: the registry
//! resolves each entry's `module`/`class` pair to a factory, the supervisor
//! instantiates the apps and drives them (once, or on their poll interval)
//! on a concurrency-capped scheduler, and a per-app lifecycle state machine
//! tracks where each instance is.

#![warn(missing_docs, clippy::pedantic)]

mod app;
mod lifecycle;
mod registry;
mod scheduler;
mod supervisor;

pub use app::{App, AppContext, AppError, AppResult, Schedule};
pub use lifecycle::{AppEvent, AppState, Lifecycle, LifecycleError, LifecycleResult};
pub use registry::{AppFactory, AppRegistry, RegistryError};
pub use scheduler::{SchedulerConfig, SchedulerError, SchedulerResult, TaskScheduler};
pub use supervisor::{LoadOutcome, Supervisor, SupervisorConfig, SupervisorError};
