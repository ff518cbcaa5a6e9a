//! Request Queue
//!
//! Max-heap of pending requests: highest priority first, FIFO within a priority.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::scheduler::{BatchedRequest, Priority};

struct Queued {
    priority: Priority,
    seq: u64,
    request: BatchedRequest,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // BinaryHeap pops the greatest: higher priority, then lower sequence
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
pub struct RequestQueue {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: BatchedRequest) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued {
            priority: request.priority,
            seq,
            request,
        });
    }

    pub fn pop(&mut self) -> Option<BatchedRequest> {
        self.heap.pop().map(|queued| queued.request)
    }

    /// Removes every queued request, in dispatch order.
    pub fn drain(&mut self) -> Vec<BatchedRequest> {
        let mut drained = Vec::with_capacity(self.heap.len());
        while let Some(request) = self.pop() {
            drained.push(request);
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
