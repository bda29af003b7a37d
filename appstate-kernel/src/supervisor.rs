//! Instantiates configured apps and drives them to completion.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use appstate_config::AppsConfig;
use appstate_entities::StateBus;
use appstate_primitives::AppId;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::{
    App, AppContext, AppError, AppEvent, AppRegistry, AppState, Lifecycle, RegistryError, Schedule,
    SchedulerConfig, SchedulerError, TaskScheduler,
};

/// Tuning for the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    settle_delay: Duration,
    max_concurrent_apps: NonZeroUsize,
}

impl SupervisorConfig {
    /// Creates a configuration.
    #[must_use]
    pub const fn new(settle_delay: Duration, max_concurrent_apps: NonZeroUsize) -> Self {
        Self {
            settle_delay,
            max_concurrent_apps,
        }
    }

    /// Delay between starting a driver and its first tick.
    #[must_use]
    pub const fn settle_delay(self) -> Duration {
        self.settle_delay
    }

    /// Upper bound on concurrently running app drivers.
    #[must_use]
    pub const fn max_concurrent_apps(self) -> NonZeroUsize {
        self.max_concurrent_apps
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), NonZeroUsize::new(16).expect("non-zero"))
    }
}

/// Errors surfaced while loading or starting apps.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The entry's `module`/`class` pair did not resolve.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The factory rejected the entry's options.
    #[error(transparent)]
    App(#[from] AppError),

    /// The scheduler refused to spawn a driver.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Result of resolving and instantiating a configuration.
#[derive(Debug)]
pub struct LoadOutcome {
    loaded: Vec<AppId>,
    failed: Vec<(AppId, SupervisorError)>,
}

impl LoadOutcome {
    /// Instance names that were built and are ready to start.
    #[must_use]
    pub fn loaded(&self) -> &[AppId] {
        &self.loaded
    }

    /// Instance names that failed to resolve or build, with their errors.
    #[must_use]
    pub fn failed(&self) -> &[(AppId, SupervisorError)] {
        &self.failed
    }

    /// Returns `true` when every configured entry loaded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

struct LoadedApp {
    id: AppId,
    app: Box<dyn App>,
    lifecycle: Lifecycle,
}

/// Owns the registry, bus, and scheduler, and runs apps from a configuration.
pub struct Supervisor {
    registry: Arc<AppRegistry>,
    bus: StateBus,
    config: SupervisorConfig,
    scheduler: TaskScheduler,
    shutdown: Arc<AtomicBool>,
    states: Arc<Mutex<HashMap<AppId, AppState>>>,
    pending: Vec<LoadedApp>,
    handles: Vec<(AppId, JoinHandle<()>)>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .field("running", &self.handles.len())
            .finish()
    }
}

impl Supervisor {
    /// Creates a supervisor with default tuning.
    #[must_use]
    pub fn new(registry: Arc<AppRegistry>, bus: StateBus) -> Self {
        Self::with_config(registry, bus, SupervisorConfig::default())
    }

    /// Creates a supervisor with explicit tuning.
    #[must_use]
    pub fn with_config(registry: Arc<AppRegistry>, bus: StateBus, config: SupervisorConfig) -> Self {
        let scheduler = TaskScheduler::new(SchedulerConfig::new(config.max_concurrent_apps()));
        Self {
            registry,
            bus,
            config,
            scheduler,
            shutdown: Arc::new(AtomicBool::new(false)),
            states: Arc::new(Mutex::new(HashMap::new())),
            pending: Vec::new(),
            handles: Vec::new(),
        }
    }

    /// Returns the shared entity state bus.
    #[must_use]
    pub const fn bus(&self) -> &StateBus {
        &self.bus
    }

    /// Resolves and instantiates every configured entry. Entries that fail
    /// to resolve or build are reported in the outcome; the rest still load.
    pub fn load(&mut self, config: &AppsConfig) -> LoadOutcome {
        let mut loaded = Vec::new();
        let mut failed = Vec::new();

        for (id, spec) in config.iter() {
            let built = self
                .registry
                .resolve(spec.module(), spec.class())
                .map_err(SupervisorError::from)
                .and_then(|factory| factory.build(id, spec).map_err(SupervisorError::from));

            match built {
                Ok(app) => {
                    let mut lifecycle = Lifecycle::new(id.clone());
                    // Loaded -> Initialized cannot fail.
                    let _ = lifecycle.transition(AppEvent::Initialize);
                    self.record_state(id, lifecycle.state());
                    info!(app = %id, module = spec.module(), class = spec.class(), "app loaded");
                    loaded.push(id.clone());
                    self.pending.push(LoadedApp {
                        id: id.clone(),
                        app,
                        lifecycle,
                    });
                }
                Err(err) => {
                    warn!(app = %id, error = %err, "app failed to load");
                    self.record_state(id, AppState::Failed);
                    failed.push((id.clone(), err));
                }
            }
        }

        LoadOutcome { loaded, failed }
    }

    /// Spawns a driver for every loaded app.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Scheduler`] when the scheduler is closed.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        for loaded in self.pending.drain(..) {
            let ctx = AppContext::new(loaded.id.clone(), self.bus.clone());
            let shutdown = Arc::clone(&self.shutdown);
            let states = Arc::clone(&self.states);
            let settle_delay = self.config.settle_delay();
            let id = loaded.id.clone();

            let handle = self.scheduler.spawn(drive_app(
                loaded.app,
                ctx,
                loaded.lifecycle,
                states,
                shutdown,
                settle_delay,
            ))?;
            self.handles.push((id, handle));
        }
        Ok(())
    }

    /// Requests shutdown and waits for every driver to exit.
    pub async fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for (id, handle) in self.handles.drain(..) {
            if let Err(err) = handle.await {
                warn!(app = %id, error = %err, "driver task aborted");
            }
        }
        self.scheduler.close();
    }

    /// Returns a snapshot of every known instance's lifecycle state.
    #[must_use]
    pub fn states(&self) -> HashMap<AppId, AppState> {
        self.states.lock().expect("state map poisoned").clone()
    }

    fn record_state(&self, id: &AppId, state: AppState) {
        self.states
            .lock()
            .expect("state map poisoned")
            .insert(id.clone(), state);
    }
}

fn record(states: &Mutex<HashMap<AppId, AppState>>, id: &AppId, state: AppState) {
    states
        .lock()
        .expect("state map poisoned")
        .insert(id.clone(), state);
}

/// Driver loop for one app instance.
async fn drive_app(
    mut app: Box<dyn App>,
    ctx: AppContext,
    mut lifecycle: Lifecycle,
    states: Arc<Mutex<HashMap<AppId, AppState>>>,
    shutdown: Arc<AtomicBool>,
    settle_delay: Duration,
) {
    let id = ctx.app_id().clone();
    let _ = lifecycle.transition(AppEvent::Start);
    record(&states, &id, lifecycle.state());

    tokio::time::sleep(settle_delay).await;

    if shutdown.load(Ordering::Acquire) {
        let _ = lifecycle.transition(AppEvent::Stop);
        let _ = lifecycle.transition(AppEvent::Finish);
        record(&states, &id, lifecycle.state());
        app.shutdown().await;
        return;
    }

    match app.schedule() {
        Schedule::Once => match app.tick(&ctx).await {
            Ok(()) => {
                info!(app = %id, "app completed");
                let _ = lifecycle.transition(AppEvent::Finish);
            }
            Err(err) => {
                warn!(app = %id, error = %err, "app failed");
                let _ = lifecycle.transition(AppEvent::Fail);
            }
        },
        Schedule::Every(period) => {
            if period.is_zero() {
                warn!(app = %id, "refusing zero-length poll interval");
                let _ = lifecycle.transition(AppEvent::Fail);
            } else {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut failures: u64 = 0;

                loop {
                    interval.tick().await;
                    if shutdown.load(Ordering::Acquire) {
                        let _ = lifecycle.transition(AppEvent::Stop);
                        record(&states, &id, lifecycle.state());
                        let _ = lifecycle.transition(AppEvent::Finish);
                        break;
                    }

                    match app.tick(&ctx).await {
                        Ok(()) => failures = 0,
                        Err(err) => {
                            failures += 1;
                            warn!(app = %id, error = %err, failures, "app tick failed");
                        }
                    }
                }
            }
        }
    }

    record(&states, &id, lifecycle.state());
    app.shutdown().await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use appstate_config::AppSpec;
    use async_trait::async_trait;

    use crate::{AppFactory, AppResult};

    use super::*;

    struct CountingApp {
        schedule: Schedule,
        ticks: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl App for CountingApp {
        fn schedule(&self) -> Schedule {
            self.schedule
        }

        async fn tick(&mut self, _ctx: &AppContext) -> AppResult<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::failed("boom"));
            }
            Ok(())
        }
    }

    struct CountingFactory {
        schedule: Schedule,
        ticks: Arc<AtomicUsize>,
        fail: bool,
    }

    impl AppFactory for CountingFactory {
        fn module(&self) -> &str {
            "stub"
        }

        fn class(&self) -> &str {
            "Counting"
        }

        fn build(&self, _app_id: &AppId, _spec: &AppSpec) -> AppResult<Box<dyn App>> {
            Ok(Box::new(CountingApp {
                schedule: self.schedule,
                ticks: Arc::clone(&self.ticks),
                fail: self.fail,
            }))
        }
    }

    const STUB_CONFIG: &str = "app:\n  module: stub\n  class: Counting\n  host: h\n";

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig::new(Duration::from_millis(5), NonZeroUsize::new(4).unwrap())
    }

    fn supervisor_with(schedule: Schedule, fail: bool) -> (Supervisor, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut registry = AppRegistry::new();
        registry
            .register(Arc::new(CountingFactory {
                schedule,
                ticks: Arc::clone(&ticks),
                fail,
            }))
            .unwrap();
        let supervisor =
            Supervisor::with_config(Arc::new(registry), StateBus::new(), fast_config());
        (supervisor, ticks)
    }

    #[tokio::test]
    async fn once_app_runs_exactly_once() {
        let (mut supervisor, ticks) = supervisor_with(Schedule::Once, false);
        let outcome = supervisor.load(&STUB_CONFIG.parse().unwrap());
        assert!(outcome.is_clean());
        assert_eq!(outcome.loaded().len(), 1);

        supervisor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        let states = supervisor.states();
        assert_eq!(states.values().next(), Some(&AppState::Stopped));
    }

    #[tokio::test]
    async fn recurring_app_survives_tick_failures() {
        let (mut supervisor, ticks) =
            supervisor_with(Schedule::Every(Duration::from_millis(10)), true);
        supervisor.load(&STUB_CONFIG.parse().unwrap());
        supervisor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 2);

        supervisor.shutdown().await;
        let states = supervisor.states();
        assert_eq!(states.values().next(), Some(&AppState::Stopped));
    }

    #[tokio::test]
    async fn shutdown_stops_recurring_apps() {
        let (mut supervisor, ticks) =
            supervisor_with(Schedule::Every(Duration::from_millis(10)), false);
        supervisor.load(&STUB_CONFIG.parse().unwrap());
        supervisor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        supervisor.shutdown().await;
        let after = ticks.load(Ordering::SeqCst);
        assert!(after >= 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after);
    }

    #[tokio::test]
    async fn unresolved_entries_are_reported_not_fatal() {
        let registry = AppRegistry::new();
        let mut supervisor =
            Supervisor::with_config(Arc::new(registry), StateBus::new(), fast_config());

        let outcome = supervisor.load(&STUB_CONFIG.parse().unwrap());
        assert_eq!(outcome.loaded().len(), 0);
        assert_eq!(outcome.failed().len(), 1);
        assert!(matches!(
            outcome.failed()[0].1,
            SupervisorError::Registry(RegistryError::UnknownModule { .. })
        ));
        assert_eq!(
            supervisor.states().values().next(),
            Some(&AppState::Failed)
        );
    }

    #[tokio::test]
    async fn zero_interval_is_rejected_at_spawn() {
        let (mut supervisor, ticks) = supervisor_with(Schedule::Every(Duration::ZERO), false);
        supervisor.load(&STUB_CONFIG.parse().unwrap());
        supervisor.start().unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(
            supervisor.states().values().next(),
            Some(&AppState::Failed)
        );
    }
}
