//! Memory Monitor
//!
//! Samples memory on demand, keeps a short history for trend estimation and
//! runs cleanup callbacks when utilisation crosses the configured thresholds.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::memory::{MemoryHistory, MemorySample, MemorySource, MemoryTrend};

/// A cleanup action. May be invoked from the sampling task or inline from a
/// request, possibly concurrently.
pub type CleanupCallback = Arc<dyn Fn() + Send + Sync>;

// == Thresholds ==
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryThresholds {
    /// Above this percent gentle cleanup runs
    pub warning_percent: f64,
    /// Above this percent emergency cleanup runs and new work is refused
    pub critical_percent: f64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            warning_percent: 75.0,
            critical_percent: 85.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    Normal,
    Warning,
    Critical,
}

impl MemoryThresholds {
    pub fn level(&self, used_percent: f64) -> PressureLevel {
        if used_percent > self.critical_percent {
            PressureLevel::Critical
        } else if used_percent > self.warning_percent {
            PressureLevel::Warning
        } else {
            PressureLevel::Normal
        }
    }
}

// == Memory Status ==
/// Result of one `monitor()` pass.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatus {
    pub current_percent: f64,
    pub available_mb: f64,
    pub trend: MemoryTrend,
    pub level: PressureLevel,
    pub cleanup_triggered: bool,
}

/// Counters of cleanup passes since start.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupCounts {
    pub gentle: u64,
    pub emergency: u64,
}

// == Memory Monitor ==
pub struct MemoryMonitor {
    source: Box<dyn MemorySource>,
    thresholds: MemoryThresholds,
    history: Mutex<MemoryHistory>,
    gentle_callbacks: RwLock<Vec<CleanupCallback>>,
    emergency_callbacks: RwLock<Vec<CleanupCallback>>,
    gentle_runs: AtomicU64,
    emergency_runs: AtomicU64,
}

impl MemoryMonitor {
    pub fn new(source: impl MemorySource + 'static, thresholds: MemoryThresholds) -> Self {
        Self {
            source: Box::new(source),
            thresholds,
            history: Mutex::new(MemoryHistory::new()),
            gentle_callbacks: RwLock::new(Vec::new()),
            emergency_callbacks: RwLock::new(Vec::new()),
            gentle_runs: AtomicU64::new(0),
            emergency_runs: AtomicU64::new(0),
        }
    }

    pub fn thresholds(&self) -> MemoryThresholds {
        self.thresholds
    }

    /// Registers a callback run on every gentle cleanup (and therefore also
    /// on every emergency cleanup).
    pub fn register_cleanup_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.gentle_callbacks.write().push(Arc::new(callback));
    }

    /// Registers a callback run only on emergency cleanup, after the gentle ones.
    pub fn register_emergency_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.emergency_callbacks.write().push(Arc::new(callback));
    }

    // == Sample ==
    /// Takes one reading and appends it to the history.
    ///
    /// An unreadable source is logged and reported as 0% used, so a broken
    /// probe never sheds load.
    pub fn sample(&self) -> MemorySample {
        let reading = match self.source.read() {
            Ok(reading) => reading,
            Err(err) => {
                warn!("Failed to read memory usage: {}", err);
                crate::memory::MemoryReading {
                    used_percent: 0.0,
                    available_mb: 0.0,
                }
            }
        };

        self.history.lock().push(Instant::now(), reading.used_percent);

        MemorySample {
            timestamp: Utc::now(),
            used_percent: reading.used_percent,
            available_mb: reading.available_mb,
        }
    }

    // == Monitor ==
    /// Samples memory, classifies the pressure level and runs cleanup for it.
    pub fn monitor(&self) -> MemoryStatus {
        let sample = self.sample();
        let trend = self.history.lock().trend();
        let level = self.thresholds.level(sample.used_percent);

        let cleanup_triggered = match level {
            PressureLevel::Critical => {
                warn!(
                    "Memory at {:.1}% (critical > {:.1}%), running emergency cleanup",
                    sample.used_percent, self.thresholds.critical_percent
                );
                self.emergency_cleanup();
                true
            }
            PressureLevel::Warning => {
                debug!(
                    "Memory at {:.1}% (warning > {:.1}%), running gentle cleanup",
                    sample.used_percent, self.thresholds.warning_percent
                );
                self.gentle_cleanup();
                true
            }
            PressureLevel::Normal => false,
        };

        MemoryStatus {
            current_percent: sample.used_percent,
            available_mb: sample.available_mb,
            trend,
            level,
            cleanup_triggered,
        }
    }

    pub fn cleanup_counts(&self) -> CleanupCounts {
        CleanupCounts {
            gentle: self.gentle_runs.load(Ordering::Relaxed),
            emergency: self.emergency_runs.load(Ordering::Relaxed),
        }
    }

    // == Cleanup ==
    fn gentle_cleanup(&self) {
        self.gentle_runs.fetch_add(1, Ordering::Relaxed);
        // Snapshot first so callbacks run without the registry lock held
        let callbacks = self.gentle_callbacks.read().clone();
        run_callbacks(&callbacks);
    }

    fn emergency_cleanup(&self) {
        self.gentle_cleanup();
        self.emergency_runs.fetch_add(1, Ordering::Relaxed);
        let callbacks = self.emergency_callbacks.read().clone();
        run_callbacks(&callbacks);
    }
}

fn run_callbacks(callbacks: &[CleanupCallback]) {
    for callback in callbacks {
        if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            error!("Memory cleanup callback panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedMemorySource;
    use std::sync::atomic::AtomicUsize;

    fn monitor_at(percent: f64) -> MemoryMonitor {
        MemoryMonitor::new(FixedMemorySource::new(percent), MemoryThresholds::default())
    }

    fn counter_callback(counter: &Arc<AtomicUsize>) -> impl Fn() + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_levels() {
        let thresholds = MemoryThresholds::default();
        assert_eq!(thresholds.level(50.0), PressureLevel::Normal);
        assert_eq!(thresholds.level(75.0), PressureLevel::Normal);
        assert_eq!(thresholds.level(80.0), PressureLevel::Warning);
        assert_eq!(thresholds.level(85.0), PressureLevel::Warning);
        assert_eq!(thresholds.level(86.0), PressureLevel::Critical);
    }

    #[test]
    fn test_normal_runs_nothing() {
        let monitor = monitor_at(40.0);
        let gentle = Arc::new(AtomicUsize::new(0));
        monitor.register_cleanup_callback(counter_callback(&gentle));

        let status = monitor.monitor();

        assert!(!status.cleanup_triggered);
        assert_eq!(status.level, PressureLevel::Normal);
        assert_eq!(gentle.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_warning_runs_gentle_only() {
        let monitor = monitor_at(80.0);
        let gentle = Arc::new(AtomicUsize::new(0));
        let emergency = Arc::new(AtomicUsize::new(0));
        monitor.register_cleanup_callback(counter_callback(&gentle));
        monitor.register_emergency_callback(counter_callback(&emergency));

        let status = monitor.monitor();

        assert!(status.cleanup_triggered);
        assert_eq!(gentle.load(Ordering::SeqCst), 1);
        assert_eq!(emergency.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_critical_runs_both() {
        let monitor = monitor_at(86.0);
        let gentle = Arc::new(AtomicUsize::new(0));
        let emergency = Arc::new(AtomicUsize::new(0));
        monitor.register_cleanup_callback(counter_callback(&gentle));
        monitor.register_emergency_callback(counter_callback(&emergency));

        let status = monitor.monitor();

        assert!(status.cleanup_triggered);
        assert_eq!(status.level, PressureLevel::Critical);
        assert_eq!(gentle.load(Ordering::SeqCst), 1);
        assert_eq!(emergency.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.cleanup_counts().emergency, 1);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_others() {
        let monitor = monitor_at(80.0);
        let gentle = Arc::new(AtomicUsize::new(0));
        monitor.register_cleanup_callback(|| panic!("cleanup exploded"));
        monitor.register_cleanup_callback(counter_callback(&gentle));

        monitor.monitor();

        assert_eq!(gentle.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_reenter_monitor() {
        let monitor = Arc::new(monitor_at(80.0));
        let weak = Arc::downgrade(&monitor);
        monitor.register_cleanup_callback(move || {
            if let Some(monitor) = weak.upgrade() {
                monitor.register_emergency_callback(|| {});
                monitor.sample();
            }
        });

        let status = monitor.monitor();
        assert!(status.cleanup_triggered);
    }

    #[test]
    fn test_unreadable_source_reports_zero() {
        let monitor = MemoryMonitor::new(
            crate::memory::ProcMeminfo::at("/no/such/meminfo"),
            MemoryThresholds::default(),
        );
        let status = monitor.monitor();
        assert_eq!(status.current_percent, 0.0);
        assert!(!status.cleanup_triggered);
    }
}
