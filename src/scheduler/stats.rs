//! Scheduler Statistics
//!
//! Counters for batches, outcomes and skipped requests.

use serde::Serialize;

/// Scheduler counters since start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub batches_processed: u64,
    /// Requests handed to dispatch across all batches
    pub total_requests: u64,
    pub avg_batch_size: f64,
    pub completed: u64,
    pub failed: u64,
    /// Skipped or discarded because the caller stopped waiting
    pub abandoned: u64,
    /// Deadline passed before dispatch
    pub expired: u64,
    /// Role groups whose dispatch worker panicked
    pub aborted_groups: u64,
    /// Requests waiting at the time of the snapshot
    pub queue_depth: usize,
}

impl SchedulerStats {
    pub fn record_batch(&mut self, size: usize) {
        self.batches_processed += 1;
        self.total_requests += size as u64;
        self.avg_batch_size = self.total_requests as f64 / self.batches_processed as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_batch_size() {
        let mut stats = SchedulerStats::default();
        stats.record_batch(4);
        stats.record_batch(2);

        assert_eq!(stats.batches_processed, 2);
        assert_eq!(stats.total_requests, 6);
        assert!((stats.avg_batch_size - 3.0).abs() < f64::EPSILON);
    }
}
