//! Periodic sweep task with explicit shutdown

use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use searchadm_core::{AdminError, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Something that can retire its unhealthy entries
pub trait Sweep: Send + Sync + 'static {
    /// Remove unhealthy entries, returning how many were removed.
    fn sweep(&self) -> usize;
}

/// Running sweep task
struct MonitorSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    interval: Duration,
}

/// Owns at most one background sweep task.
///
/// The task holds only a weak reference to its target, so it ends by itself
/// once the target is dropped. Dropping the monitor aborts the task.
#[derive(Default)]
pub struct HealthMonitor {
    slot: Mutex<Option<MonitorSlot>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start sweeping `target` every `interval`.
    ///
    /// Returns `Ok(false)` without doing anything when a sweep is already
    /// running. Must be called from within a Tokio runtime.
    pub fn start(&self, target: Weak<dyn Sweep>, interval: Duration) -> Result<bool> {
        if interval.is_zero() {
            return Err(AdminError::Configuration(
                "monitoring interval must be greater than zero".into(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AdminError::Runtime(format!("monitoring needs a Tokio runtime: {e}")))?;

        let mut slot = self.slot.lock();
        if let Some(running) = slot.as_ref()
            && !running.handle.is_finished()
        {
            tracing::debug!(interval_ms = running.interval.as_millis() as u64, "health sweep already running");
            return Ok(false);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(run_sweep_loop(target, interval, shutdown_rx));
        *slot = Some(MonitorSlot {
            handle,
            shutdown_tx,
            interval,
        });

        tracing::info!(interval_ms = interval.as_millis() as u64, "health sweep started");
        Ok(true)
    }

    /// Stop the sweep and wait for the task to finish.
    ///
    /// Returns `false` if no sweep was running.
    pub async fn stop(&self) -> bool {
        let Some(slot) = self.slot.lock().take() else {
            return false;
        };

        let _ = slot.shutdown_tx.send(true);
        if let Err(e) = slot.handle.await
            && !e.is_cancelled()
        {
            tracing::warn!(error = %e, "health sweep task ended abnormally");
        }

        tracing::info!("health sweep stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|slot| !slot.handle.is_finished())
    }

    /// Interval of the running sweep, if any.
    pub fn interval(&self) -> Option<Duration> {
        self.slot.lock().as_ref().map(|slot| slot.interval)
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.get_mut().take() {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
        }
    }
}

async fn run_sweep_loop(
    target: Weak<dyn Sweep>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    tracing::debug!(interval_ms = period.as_millis() as u64, "health sweep loop starting");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(target) = target.upgrade() else {
                    tracing::debug!("sweep target dropped, ending health sweep");
                    break;
                };
                let removed = target.sweep();
                if removed > 0 {
                    tracing::info!(removed, "health sweep removed unhealthy connections");
                }
            }
            _ = shutdown.changed() => {
                tracing::debug!("health sweep shutting down");
                break;
            }
        }
    }
}
