//! Lifecycle state machine for app instances.

use appstate_primitives::AppId;
use thiserror::Error;
use tracing::debug;

/// Discrete states an app instance can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Spec resolved to a factory but the app is not built yet.
    Loaded,
    /// App constructed from its options and ready to start.
    Initialized,
    /// Driver loop is active.
    Running,
    /// Shutdown requested; the driver is winding down.
    Stopping,
    /// Driver exited normally (including one-shot completion).
    Stopped,
    /// App construction or a one-shot tick failed permanently.
    Failed,
}

impl AppState {
    /// Returns `true` while the driver loop is active.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` once the instance can never run again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

/// Events that trigger lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// Factory built the app instance.
    Initialize,
    /// Driver loop started.
    Start,
    /// Shutdown was requested.
    Stop,
    /// Driver exited cleanly.
    Finish,
    /// The instance failed permanently.
    Fail,
}

/// Lifecycle state manager for one app instance.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    app_id: AppId,
    state: AppState,
}

impl Lifecycle {
    /// Constructs a lifecycle controller for the given instance.
    #[must_use]
    pub const fn new(app_id: AppId) -> Self {
        Self {
            app_id,
            state: AppState::Loaded,
        }
    }

    /// Returns the owning app instance id.
    #[must_use]
    pub const fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> AppState {
        self.state
    }

    /// Applies a lifecycle event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the supplied event
    /// is not allowed from the current state.
    pub fn transition(&mut self, event: AppEvent) -> LifecycleResult<AppState> {
        let next = match (self.state, event) {
            (AppState::Loaded, AppEvent::Initialize) => Some(AppState::Initialized),
            (AppState::Initialized, AppEvent::Start) => Some(AppState::Running),
            (AppState::Initialized | AppState::Running, AppEvent::Stop) => {
                Some(AppState::Stopping)
            }
            (AppState::Running | AppState::Stopping, AppEvent::Finish) => Some(AppState::Stopped),
            (
                AppState::Loaded | AppState::Initialized | AppState::Running | AppState::Stopping,
                AppEvent::Fail,
            ) => Some(AppState::Failed),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(LifecycleError::InvalidTransition {
                app_id: self.app_id.clone(),
                from: self.state,
                event,
            });
        };

        if next_state != self.state {
            debug!(
                app_id = %self.app_id,
                ?self.state,
                ?next_state,
                ?event,
                "app lifecycle transition"
            );
            self.state = next_state;
        }

        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid lifecycle transition from {from:?} via {event:?} for app {app_id}")]
    InvalidTransition {
        /// Instance whose transition failed.
        app_id: AppId,
        /// State prior to the attempted transition.
        from: AppState,
        /// Event that triggered the failure.
        event: AppEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
