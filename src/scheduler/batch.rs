//! Batch Scheduler
//!
//! Collects queued requests into batches and dispatches them to the
//! inference engine, one role group at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::InferenceError;
use crate::inference::{InferenceEngine, Role};
use crate::scheduler::{BatchConfig, BatchedRequest, RequestQueue, SchedulerStats};

/// How long an idle collector waits for work before looping.
const IDLE_WAIT: Duration = Duration::from_millis(10);

struct Shared {
    queue: Mutex<RequestQueue>,
    notify: Notify,
    engine: Arc<dyn InferenceEngine>,
    config: BatchConfig,
    stats: Mutex<SchedulerStats>,
    stopped: AtomicBool,
}

// == Batch Scheduler ==
/// Priority queue plus a single collector task.
///
/// Batches are dispatched one after another and each role group runs on one
/// blocking worker, so at most one `generate` call is in flight per scheduler.
pub struct BatchScheduler {
    shared: Arc<Shared>,
    collector: Mutex<Option<JoinHandle<()>>>,
}

impl BatchScheduler {
    pub fn new(engine: Arc<dyn InferenceEngine>, config: BatchConfig) -> Self {
        let config = BatchConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(RequestQueue::new()),
                notify: Notify::new(),
                engine,
                config,
                stats: Mutex::new(SchedulerStats::default()),
                stopped: AtomicBool::new(false),
            }),
            collector: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.shared.config
    }

    // == Submit ==
    /// Queues a request and makes sure the collector is running.
    ///
    /// Must be called from within a tokio runtime. The caller awaits the
    /// `PendingResult` created alongside the request.
    pub fn submit(&self, request: BatchedRequest) {
        {
            let mut queue = self.shared.queue.lock();
            if self.shared.stopped.load(Ordering::SeqCst) {
                drop(queue);
                request.complete(Err(InferenceError::Unavailable(
                    "scheduler stopped".to_string(),
                )));
                return;
            }
            queue.push(request);
        }
        self.shared.notify.notify_one();
        self.ensure_collector();
    }

    pub fn stats(&self) -> SchedulerStats {
        let queue_depth = self.shared.queue.lock().len();
        let mut stats = self.shared.stats.lock().clone();
        stats.queue_depth = queue_depth;
        stats
    }

    pub fn is_running(&self) -> bool {
        self.collector
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // == Shutdown ==
    /// Stops the collector and fails every request still queued.
    ///
    /// A group already handed to a blocking worker runs to completion.
    pub fn shutdown(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.collector.lock().take() {
            handle.abort();
        }

        let drained = self.shared.queue.lock().drain();
        let released = drained.len();
        for request in drained {
            request.complete(Err(InferenceError::Unavailable(
                "scheduler stopped".to_string(),
            )));
        }
        info!("Batch scheduler stopped, released {} queued requests", released);
    }

    fn ensure_collector(&self) {
        let mut collector = self.collector.lock();
        let running = collector
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if !running {
            *collector = Some(tokio::spawn(collect_loop(Arc::clone(&self.shared))));
            debug!("Batch collector started");
        }
    }
}

impl Drop for BatchScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.collector.get_mut().take() {
            handle.abort();
        }
    }
}

async fn collect_loop(shared: Arc<Shared>) {
    loop {
        let batch = shared.collect_batch().await;
        if !batch.is_empty() {
            shared.dispatch(batch).await;
        }
    }
}

impl Shared {
    // == Collect ==
    /// Waits briefly for work; once something is queued, keeps the window
    /// open until `batch_size` requests are waiting or `batch_timeout` has
    /// passed, then takes the best `batch_size` live requests.
    async fn collect_batch(&self) -> Vec<BatchedRequest> {
        if self.queue.lock().is_empty() {
            let _ = tokio::time::timeout(IDLE_WAIT, self.notify.notified()).await;
            if self.queue.lock().is_empty() {
                return Vec::new();
            }
        }

        let batch_size = self.config.batch_size;
        let window_end = tokio::time::Instant::now() + self.config.batch_timeout;
        while self.queue.lock().len() < batch_size {
            if tokio::time::timeout_at(window_end, self.notify.notified())
                .await
                .is_err()
            {
                break;
            }
        }

        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.pop_live() {
                Some(request) => batch.push(request),
                None => break,
            }
        }
        batch
    }

    /// Pops the next request worth dispatching, settling abandoned and
    /// expired ones on the way.
    fn pop_live(&self) -> Option<BatchedRequest> {
        loop {
            let request = self.queue.lock().pop()?;
            if let Some(request) = self.screen(request) {
                return Some(request);
            }
        }
    }

    /// Returns the request if it should still run.
    fn screen(&self, request: BatchedRequest) -> Option<BatchedRequest> {
        if request.is_expired_at(Instant::now()) {
            debug!("Skipping request {}, deadline passed", request.id);
            self.stats.lock().expired += 1;
            request.complete(Err(InferenceError::DeadlineExceeded));
            return None;
        }
        if request.is_abandoned() {
            debug!("Skipping request {}, caller gone", request.id);
            self.stats.lock().abandoned += 1;
            return None;
        }
        Some(request)
    }

    // == Dispatch ==
    async fn dispatch(self: &Arc<Self>, batch: Vec<BatchedRequest>) {
        let groups = group_by_role(batch);
        let size: usize = groups.iter().map(|(_, group)| group.len()).sum();
        debug!("Dispatching batch of {} in {} role groups", size, groups.len());
        self.stats.lock().record_batch(size);

        for (role, group) in groups {
            let group_size = group.len();
            let shared = Arc::clone(self);
            let worker = tokio::task::spawn_blocking(move || shared.run_group(role, group));
            if let Err(err) = worker.await {
                // The group's remaining senders were dropped with the worker
                error!(
                    "Dispatch of {} '{}' requests aborted: {}",
                    group_size, role, err
                );
                self.stats.lock().aborted_groups += 1;
            }
        }
    }

    fn run_group(&self, role: Role, group: Vec<BatchedRequest>) {
        for request in group {
            let Some(request) = self.screen(request) else {
                continue;
            };

            let result = self.engine.generate(&request.input_text, role);
            match &result {
                Ok(_) => self.stats.lock().completed += 1,
                Err(err) => {
                    warn!("Inference failed for request {}: {}", request.id, err);
                    self.stats.lock().failed += 1;
                }
            }

            let id = request.id.clone();
            if !request.complete(result) {
                debug!("Request {} finished after its caller gave up", id);
                self.stats.lock().abandoned += 1;
            }
        }
    }
}

/// Splits a batch by role, groups in order of first appearance.
fn group_by_role(batch: Vec<BatchedRequest>) -> Vec<(Role, Vec<BatchedRequest>)> {
    let mut groups: Vec<(Role, Vec<BatchedRequest>)> = Vec::new();
    for request in batch {
        match groups.iter_mut().find(|(role, _)| *role == request.role) {
            Some((_, group)) => group.push(request),
            None => groups.push((request.role, vec![request])),
        }
    }
    groups
}
