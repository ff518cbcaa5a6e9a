//! Memory Sampling Task

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::memory::MemoryMonitor;

/// Spawns a task that runs a monitor pass every `interval`, keeping the trend
/// history current and triggering cleanup between requests.
pub fn spawn_memory_sampler_task(memory: Arc<MemoryMonitor>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting memory sampler with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let status = memory.monitor();
            debug!(
                "Memory at {:.1}% ({:?}, trend {:?})",
                status.current_percent, status.level, status.trend
            );
        }
    })
}
