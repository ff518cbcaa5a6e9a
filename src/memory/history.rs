//! Memory History
//!
//! Time-bounded ring buffer of samples and the trend derived from it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Samples older than this are dropped.
pub const HISTORY_WINDOW: Duration = Duration::from_secs(60);

/// Number of most recent samples used for the slope.
pub const TREND_SAMPLES: usize = 5;

/// Slope in percentage points per second beyond which memory is trending.
pub const TREND_SLOPE_PER_SEC: f64 = 0.5;

// == Memory Sample ==
/// One memory reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySample {
    pub timestamp: DateTime<Utc>,
    pub used_percent: f64,
    pub available_mb: f64,
}

// == Memory Trend ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTrend {
    Increasing,
    Decreasing,
    Stable,
}

// == Memory History ==
/// Append-only ring buffer of `(taken_at, used_percent)` bounded by [`HISTORY_WINDOW`].
#[derive(Debug)]
pub struct MemoryHistory {
    samples: VecDeque<(Instant, f64)>,
    window: Duration,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::with_window(HISTORY_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
        }
    }

    /// Appends a sample and drops everything older than the window.
    ///
    /// Amortized O(1): each sample is pushed and popped once.
    pub fn push(&mut self, taken_at: Instant, used_percent: f64) {
        self.samples.push_back((taken_at, used_percent));
        while let Some(&(oldest, _)) = self.samples.front() {
            if taken_at.saturating_duration_since(oldest) >= self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Slope of the last [`TREND_SAMPLES`] samples, classified.
    pub fn trend(&self) -> MemoryTrend {
        let skip = self.samples.len().saturating_sub(TREND_SAMPLES);
        let mut recent = self.samples.iter().skip(skip);
        let (first, last) = match (recent.next(), self.samples.back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return MemoryTrend::Stable,
        };

        let elapsed = last.0.saturating_duration_since(first.0).as_secs_f64();
        if elapsed <= 0.0 {
            return MemoryTrend::Stable;
        }

        let slope = (last.1 - first.1) / elapsed;
        if slope > TREND_SLOPE_PER_SEC {
            MemoryTrend::Increasing
        } else if slope < -TREND_SLOPE_PER_SEC {
            MemoryTrend::Decreasing
        } else {
            MemoryTrend::Stable
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}
