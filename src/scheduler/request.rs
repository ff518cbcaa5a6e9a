//! Batched Request
//!
//! One unit of queued work and the single-assignment slot its result lands in.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{InferenceError, ServeError};
use crate::inference::Role;

pub type InferenceResult = Result<String, InferenceError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

// == Batched Request ==
/// A prompt waiting for dispatch.
///
/// The sender half of its result slot is consumed by the first completion,
/// so a request can be resolved at most once.
#[derive(Debug)]
pub struct BatchedRequest {
    pub id: String,
    pub input_text: String,
    pub role: Role,
    pub priority: Priority,
    pub submitted_at: Instant,
    pub timeout: Duration,
    slot: oneshot::Sender<InferenceResult>,
}

impl BatchedRequest {
    /// Creates a request together with the handle its caller awaits.
    pub fn new(
        id: impl Into<String>,
        input_text: impl Into<String>,
        role: Role,
        priority: Priority,
        timeout: Duration,
    ) -> (Self, PendingResult) {
        let (tx, rx) = oneshot::channel();
        let submitted_at = Instant::now();
        let request = Self {
            id: id.into(),
            input_text: input_text.into(),
            role,
            priority,
            submitted_at,
            timeout,
            slot: tx,
        };
        let pending = PendingResult {
            deadline: submitted_at + timeout,
            timeout,
            rx,
        };
        (request, pending)
    }

    pub fn deadline(&self) -> Instant {
        self.submitted_at + self.timeout
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.deadline()
    }

    /// True once the caller has stopped waiting.
    pub fn is_abandoned(&self) -> bool {
        self.slot.is_closed()
    }

    /// Resolves the request. Returns false if nobody was waiting any more,
    /// in which case the result is dropped.
    pub fn complete(self, result: InferenceResult) -> bool {
        self.slot.send(result).is_ok()
    }
}

// == Pending Result ==
/// Caller side of a request's result slot.
///
/// Dropping it abandons the request; the scheduler then skips it or
/// discards its result.
#[derive(Debug)]
pub struct PendingResult {
    deadline: Instant,
    timeout: Duration,
    rx: oneshot::Receiver<InferenceResult>,
}

impl PendingResult {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Waits until the request resolves or its deadline passes.
    pub async fn wait(self) -> Result<String, ServeError> {
        let deadline = tokio::time::Instant::from_std(self.deadline);
        match tokio::time::timeout_at(deadline, self.rx).await {
            Err(_) => Err(ServeError::RequestTimeout(self.timeout)),
            Ok(Err(_)) => Err(ServeError::UpstreamFailure(
                "request dropped before completion".to_string(),
            )),
            Ok(Ok(Err(InferenceError::DeadlineExceeded))) => {
                Err(ServeError::RequestTimeout(self.timeout))
            }
            Ok(Ok(Err(err))) => Err(ServeError::UpstreamFailure(err.to_string())),
            Ok(Ok(Ok(text))) => Ok(text),
        }
    }
}
