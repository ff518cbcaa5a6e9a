//! Scheduler Module
//!
//! Priority queue and batch collector in front of the inference engine.

mod batch;
mod queue;
mod request;
mod stats;

use std::time::Duration;

pub use batch::BatchScheduler;
pub use queue::RequestQueue;
pub use request::{BatchedRequest, InferenceResult, PendingResult, Priority};
pub use stats::SchedulerStats;

// == Batch Config ==
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum requests per dispatched batch
    pub batch_size: usize,
    /// How long collection keeps waiting after the first request of a batch.
    ///
    /// A partial batch is held for the whole window, so a lone request pays
    /// up to this much extra latency before dispatch.
    pub batch_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 4,
            batch_timeout: Duration::from_millis(100),
        }
    }
}
