//! The app abstraction every configured entry resolves to.

use std::time::Duration;

use appstate_entities::StateBus;
use appstate_primitives::AppId;
use async_trait::async_trait;
use thiserror::Error;

/// Result alias for app operations.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by app construction and ticks.
#[derive(Debug, Error)]
pub enum AppError {
    /// The app's options were missing or unusable.
    #[error("app configuration error: {reason}")]
    Config {
        /// Additional context for the failure.
        reason: String,
    },

    /// Talking to the device failed.
    #[error("device error: {reason}")]
    Device {
        /// Additional context for the failure.
        reason: String,
    },

    /// Any other app failure.
    #[error("app error: {reason}")]
    Failed {
        /// Additional context for the failure.
        reason: String,
    },
}

impl AppError {
    /// Convenience constructor for configuration failures.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for device failures.
    #[must_use]
    pub fn device(reason: impl Into<String>) -> Self {
        Self::Device {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for general failures.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// How the supervisor drives an app after the settle delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Tick exactly once.
    Once,
    /// Tick on a fixed interval until shutdown.
    Every(Duration),
}

impl Schedule {
    /// Returns `true` for interval-driven apps.
    #[must_use]
    pub const fn is_recurring(self) -> bool {
        matches!(self, Self::Every(_))
    }
}

/// Per-instance context handed to every tick.
#[derive(Clone, Debug)]
pub struct AppContext {
    app_id: AppId,
    bus: StateBus,
}

impl AppContext {
    /// Creates a context for the given app instance.
    #[must_use]
    pub const fn new(app_id: AppId, bus: StateBus) -> Self {
        Self { app_id, bus }
    }

    /// Returns the owning app instance id.
    #[must_use]
    pub const fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Returns the shared entity state bus.
    #[must_use]
    pub const fn bus(&self) -> &StateBus {
        &self.bus
    }
}

/// Trait implemented by all app classes.
#[async_trait]
pub trait App: Send {
    /// Returns how this instance wants to be driven.
    fn schedule(&self) -> Schedule;

    /// Performs one unit of work.
    ///
    /// For recurring apps a failed tick is logged and counted by the driver
    /// but never fatal; the next tick proceeds.
    async fn tick(&mut self, ctx: &AppContext) -> AppResult<()>;

    /// Called once when the driver exits, for connection teardown.
    async fn shutdown(&mut self) {}
}
