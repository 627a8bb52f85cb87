use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use searchadm_core::AdminError;

#[derive(Default)]
struct CountingTarget {
    sweeps: AtomicUsize,
}

impl Sweep for CountingTarget {
    fn sweep(&self) -> usize {
        self.sweeps.fetch_add(1, Ordering::SeqCst);
        0
    }
}

fn weak(target: &Arc<CountingTarget>) -> Weak<dyn Sweep> {
    let target: Arc<dyn Sweep> = target.clone();
    Arc::downgrade(&target)
}

#[tokio::test(start_paused = true)]
async fn test_sweeps_on_every_tick() {
    let target = Arc::new(CountingTarget::default());
    let monitor = HealthMonitor::new();

    assert!(monitor.start(weak(&target), Duration::from_secs(10)).unwrap());
    assert_eq!(monitor.interval(), Some(Duration::from_secs(10)));

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(target.sweeps.load(Ordering::SeqCst), 3);

    assert!(monitor.stop().await);
    assert!(!monitor.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent() {
    let target = Arc::new(CountingTarget::default());
    let monitor = HealthMonitor::new();

    assert!(monitor.start(weak(&target), Duration::from_secs(1)).unwrap());
    assert!(!monitor.start(weak(&target), Duration::from_millis(10)).unwrap());
    assert_eq!(monitor.interval(), Some(Duration::from_secs(1)));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(target.sweeps.load(Ordering::SeqCst), 1);
    monitor.stop().await;
}

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let target = Arc::new(CountingTarget::default());
    let monitor = HealthMonitor::new();

    let err = monitor.start(weak(&target), Duration::ZERO).unwrap_err();
    assert!(matches!(err, AdminError::Configuration(_)));
    assert!(!monitor.is_running());
}

#[test]
fn test_start_outside_runtime_fails() {
    let target = Arc::new(CountingTarget::default());
    let monitor = HealthMonitor::new();

    let err = monitor.start(weak(&target), Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, AdminError::Runtime(_)));
}

#[tokio::test]
async fn test_stop_without_start() {
    let monitor = HealthMonitor::new();
    assert!(!monitor.stop().await);
    assert_eq!(monitor.interval(), None);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_monitor_no_longer_sweeps() {
    let target = Arc::new(CountingTarget::default());
    let monitor = HealthMonitor::new();
    monitor.start(weak(&target), Duration::from_secs(1)).unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(monitor.stop().await);
    let swept = target.sweeps.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(target.sweeps.load(Ordering::SeqCst), swept);

    // a stopped monitor can be started again
    assert!(monitor.start(weak(&target), Duration::from_secs(1)).unwrap());
    monitor.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_loop_ends_when_target_dropped() {
    let target = Arc::new(CountingTarget::default());
    let monitor = HealthMonitor::new();
    monitor.start(weak(&target), Duration::from_secs(1)).unwrap();

    drop(target);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!monitor.is_running());
}
