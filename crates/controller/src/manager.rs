// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Named periodic controllers and their statistics.

use crate::error::Error;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Error type returned by controller functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Work performed by one controller run. Returns the number of items
/// processed.
pub type ControllerFunc = Arc<dyn Fn() -> Result<usize, BoxError> + Send + Sync>;

/// What a controller runs and how often.
#[derive(Clone)]
pub struct ControllerParams {
    /// Delay between the start of two runs.
    pub run_interval: Duration,
    /// Work performed by each run.
    pub do_func: ControllerFunc,
}

impl ControllerParams {
    /// Runs `do_func` every `run_interval`.
    pub fn new(
        run_interval: Duration,
        do_func: impl Fn() -> Result<usize, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            run_interval,
            do_func: Arc::new(do_func),
        }
    }
}

impl fmt::Debug for ControllerParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerParams")
            .field("run_interval", &self.run_interval)
            .finish_non_exhaustive()
    }
}

/// Accumulated outcome of a controller's runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Completed runs, successful or not.
    pub runs: u64,
    /// Failed runs.
    pub failures: u64,
    /// Failed runs since the last success.
    pub consecutive_failures: u64,
    /// Items reported by successful runs.
    pub items: u64,
    /// Duration of the latest run.
    pub last_duration: Option<Duration>,
    /// Error of the latest run, cleared by a success.
    pub last_error: Option<String>,
}

impl ControllerStats {
    fn record(&mut self, outcome: &Result<usize, BoxError>, elapsed: Duration) {
        self.runs += 1;
        self.last_duration = Some(elapsed);
        match outcome {
            Ok(items) => {
                self.items += *items as u64;
                self.consecutive_failures = 0;
                self.last_error = None;
            }
            Err(err) => {
                self.failures += 1;
                self.consecutive_failures += 1;
                self.last_error = Some(err.to_string());
            }
        }
    }
}

type StatsTable = Arc<Mutex<BTreeMap<String, ControllerStats>>>;

struct RunningController {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Owner of a set of named controllers.
///
/// Dropping the manager stops every controller without waiting for them;
/// [`ControllerManager::shutdown`] waits and returns the final statistics.
pub struct ControllerManager {
    runtime: Handle,
    controllers: Mutex<HashMap<String, RunningController>>,
    stats: StatsTable,
}

impl ControllerManager {
    /// Creates a manager spawning its controllers on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            controllers: Mutex::new(HashMap::new()),
            stats: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Creates a manager on the runtime of the calling context.
    pub fn try_current() -> Result<Self, Error> {
        let runtime = Handle::try_current().map_err(|err| Error::NoRuntime {
            details: err.to_string(),
        })?;
        Ok(Self::new(runtime))
    }

    /// Starts the controller `name`, replacing a running controller of the
    /// same name. Statistics are created on first registration and carry over
    /// across replacement.
    pub fn update_controller(&self, name: impl Into<String>, params: ControllerParams) -> Result<(), Error> {
        let name = name.into();
        if params.run_interval.is_zero() {
            return Err(Error::InvalidInterval { name });
        }

        _ = self.stats.lock().entry(name.clone()).or_default();
        let (stop, stopped) = oneshot::channel();
        let task = self.runtime.spawn(run_controller(
            name.clone(),
            params.clone(),
            Arc::clone(&self.stats),
            stopped,
        ));
        let previous = self
            .controllers
            .lock()
            .insert(name.clone(), RunningController { stop, task });

        match previous {
            Some(previous) => {
                _ = previous.stop.send(());
                tracing::debug!(controller = %name, interval = ?params.run_interval, "controller updated");
            }
            None => {
                tracing::info!(controller = %name, interval = ?params.run_interval, "controller started");
            }
        }
        Ok(())
    }

    /// Stops the controller `name`. Returns `false` if no such controller runs.
    pub fn remove_controller(&self, name: &str) -> bool {
        let Some(controller) = self.controllers.lock().remove(name) else {
            return false;
        };
        _ = controller.stop.send(());
        tracing::info!(controller = %name, "controller removed");
        true
    }

    /// Names of the running controllers, sorted.
    #[must_use]
    pub fn controller_names(&self) -> Vec<String> {
        let mut names = self.controllers.lock().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Statistics of the controller `name`, running or not.
    #[must_use]
    pub fn stats(&self, name: &str) -> Option<ControllerStats> {
        self.stats.lock().get(name).cloned()
    }

    /// Statistics of every controller that ever ran on this manager.
    #[must_use]
    pub fn stats_snapshot(&self) -> BTreeMap<String, ControllerStats> {
        self.stats.lock().clone()
    }

    /// Stops every controller, waits for in-flight runs to finish and returns
    /// the final statistics.
    pub async fn shutdown(self) -> BTreeMap<String, ControllerStats> {
        let running = self.controllers.lock().drain().collect::<Vec<_>>();
        for (name, controller) in running {
            _ = controller.stop.send(());
            if let Err(err) = controller.task.await {
                tracing::warn!(controller = %name, error = %err, "controller task failed");
            }
        }
        tracing::debug!("controller manager shut down");
        self.stats_snapshot()
    }
}

impl fmt::Debug for ControllerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerManager")
            .field("controllers", &self.controller_names())
            .finish_non_exhaustive()
    }
}

async fn run_controller(
    name: String,
    params: ControllerParams,
    stats: StatsTable,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(params.run_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Resolves on an explicit stop and when the manager is dropped.
            _ = &mut stop => break,
            _ = ticker.tick() => {}
        }

        let started = Instant::now();
        let outcome = (params.do_func)();
        let elapsed = started.elapsed();
        match &outcome {
            Ok(items) => tracing::trace!(controller = %name, items, ?elapsed, "controller run succeeded"),
            Err(err) => tracing::warn!(controller = %name, error = %err, "controller run failed"),
        }
        stats
            .lock()
            .entry(name.clone())
            .or_default()
            .record(&outcome, elapsed);
    }
    tracing::debug!(controller = %name, "controller stopped");
}

#[cfg(test)]
mod tests {
    use super::{ControllerManager, ControllerParams};
    use crate::error::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn counting(counter: &Arc<AtomicUsize>) -> ControllerParams {
        let counter = Arc::clone(counter);
        ControllerParams::new(INTERVAL, move || Ok(counter.fetch_add(1, Ordering::SeqCst) + 1))
    }

    // Scenario:
    // 1. Given a controller running every 100ms
    // 2. When 250ms elapse
    // 3. Then it ran at 0, 100 and 200ms and its stats add up the items
    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_interval() {
        let manager = ControllerManager::try_current().expect("runtime should be available");
        let counter = Arc::new(AtomicUsize::new(0));
        manager
            .update_controller("tick", counting(&counter))
            .expect("controller should start");

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        let stats = manager.shutdown().await;
        let tick = stats.get("tick").expect("stats should be recorded");
        assert_eq!(tick.runs, 3);
        assert_eq!(tick.failures, 0);
        assert_eq!(tick.items, 1 + 2 + 3);
        assert!(tick.last_duration.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_counted_and_cleared_by_success() {
        let manager = ControllerManager::try_current().expect("runtime should be available");
        let calls = Arc::new(AtomicUsize::new(0));
        let params = {
            let calls = Arc::clone(&calls);
            ControllerParams::new(INTERVAL, move || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                if call < 2 {
                    Err(format!("attempt {call} failed").into())
                } else {
                    Ok(0)
                }
            })
        };
        manager.update_controller("flaky", params).expect("controller should start");

        tokio::time::sleep(Duration::from_millis(150)).await;
        let stats = manager.stats("flaky").expect("stats should be recorded");
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.consecutive_failures, 2);
        assert_eq!(stats.last_error.as_deref(), Some("attempt 1 failed"));

        tokio::time::sleep(INTERVAL).await;
        let stats = manager.stats("flaky").expect("stats should be recorded");
        assert_eq!(stats.runs, 3);
        assert_eq!(stats.failures, 2);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.last_error, None);
    }

    // Updating a controller stops the previous function and keeps one entry.
    #[tokio::test(start_paused = true)]
    async fn update_replaces_previous_controller() {
        let manager = ControllerManager::try_current().expect("runtime should be available");
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        manager.update_controller("gc", counting(&first)).expect("start");
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.update_controller("gc", counting(&second)).expect("update");

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert!(second.load(Ordering::SeqCst) >= 5);
        assert_eq!(manager.controller_names(), vec!["gc".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn removed_controller_stops_and_keeps_stats() {
        let manager = ControllerManager::try_current().expect("runtime should be available");
        let counter = Arc::new(AtomicUsize::new(0));
        manager.update_controller("once", counting(&counter)).expect("start");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(manager.remove_controller("once"));
        assert!(!manager.remove_controller("once"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(manager.controller_names().is_empty());

        let stats = manager.shutdown().await;
        assert_eq!(stats.get("once").map(|s| s.runs), Some(1));
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let manager = ControllerManager::try_current().expect("runtime should be available");
        let err = manager
            .update_controller("busy", ControllerParams::new(Duration::ZERO, || Ok(0)))
            .expect_err("zero interval should be rejected");
        assert_eq!(err, Error::InvalidInterval { name: "busy".into() });
    }

    #[test]
    fn try_current_outside_runtime_fails() {
        assert!(matches!(
            ControllerManager::try_current(),
            Err(Error::NoRuntime { .. })
        ));
    }
}
