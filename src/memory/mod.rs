//! Memory Module
//!
//! Memory pressure monitoring that drives cache and conversation eviction.

mod history;
mod monitor;
mod source;

pub use history::{
    MemoryHistory, MemorySample, MemoryTrend, HISTORY_WINDOW, TREND_SAMPLES, TREND_SLOPE_PER_SEC,
};
pub use monitor::{
    CleanupCallback, CleanupCounts, MemoryMonitor, MemoryStatus, MemoryThresholds, PressureLevel,
};
pub use source::{parse_meminfo, FixedMemorySource, MemoryReading, MemorySource, ProcMeminfo};
