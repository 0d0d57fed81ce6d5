// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Priority queue of load requests.
//!
//! Lower priority values drain first; requests of equal priority drain in
//! arrival order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::request::{LoadRequest, RequestState, PRIORITY_FAST, PRIORITY_SYNC};

/// How a dequeued request is serviced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceMode {
    /// Serviced inline at submission, never queued
    Immediate,
    Sync,
    Async,
}

impl ServiceMode {
    pub fn for_priority(priority: i32) -> Self {
        if priority <= PRIORITY_SYNC {
            ServiceMode::Immediate
        } else if priority >= PRIORITY_FAST {
            ServiceMode::Async
        } else {
            ServiceMode::Sync
        }
    }
}

struct Queued {
    priority: i32,
    seq: u64,
    request: LoadRequest,
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
    // BinaryHeap is a max-heap: invert so the smallest (priority, seq) pops first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending requests awaiting the per-tick drain
#[derive(Default)]
pub struct Scheduler {
    queue: BinaryHeap<Queued>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mut request: LoadRequest) {
        request.set_state(RequestState::Queued);
        let seq = self.next_seq;
        self.next_seq += 1;
        request.set_sequence(seq);
        self.queue.push(Queued {
            priority: request.priority,
            seq,
            request,
        });
    }

    pub fn pop(&mut self) -> Option<LoadRequest> {
        self.queue.pop().map(|queued| queued.request)
    }

    /// Dequeue at most `budget` requests in service order
    pub fn next_batch(&mut self, budget: usize) -> Vec<LoadRequest> {
        let mut batch = Vec::with_capacity(budget.min(self.queue.len()));
        while batch.len() < budget {
            match self.pop() {
                Some(request) => batch.push(request),
                None => break,
            }
        }
        batch
    }

    /// Remove every queued request in service order
    pub fn drain(&mut self) -> Vec<LoadRequest> {
        let len = self.queue.len();
        self.next_batch(len)
    }

    pub fn peek_priority(&self) -> Option<i32> {
        self.queue.peek().map(|queued| queued.priority)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
