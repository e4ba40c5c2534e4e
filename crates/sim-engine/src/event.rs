// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! Events and the per-host priority queues that hold them.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use sim_topology::ShadowId;

use crate::time::SimulationTime;

/// A scheduled unit of work. The payload is opaque to the scheduler;
/// handlers are invoked by the worker pool and may enqueue further events.
pub struct Event {
    pub fire_time: SimulationTime,
    pub destination_host_id: ShadowId,
    pub sequence_tag: u64,
    pub payload: Box<dyn FnOnce() -> Vec<Event> + Send>,
}

impl Event {
    pub fn new(
        fire_time: SimulationTime,
        destination_host_id: ShadowId,
        sequence_tag: u64,
        payload: impl FnOnce() -> Vec<Event> + Send + 'static,
    ) -> Self {
        Self {
            fire_time,
            destination_host_id,
            sequence_tag,
            payload: Box::new(payload),
        }
    }

    fn order_key(&self) -> (SimulationTime, u64) {
        (self.fire_time, self.sequence_tag)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.order_key() == other.order_key()
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, but events must fire in
        // non-decreasing (fire_time, sequence_tag) order.
        other.order_key().cmp(&self.order_key())
    }
}

/// Priority queue for a single host's due events, ordered by
/// `(fire_time, sequence_tag)`.
#[derive(Default)]
pub struct HostQueue {
    heap: BinaryHeap<Event>,
}

impl HostQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, event: Event) {
        self.heap.push(event);
    }

    pub fn peek_fire_time(&self) -> Option<SimulationTime> {
        self.heap.peek().map(|e| e.fire_time)
    }

    /// Removes and returns every event with `fire_time < window_end`, in
    /// non-decreasing `(fire_time, sequence_tag)` order.
    pub fn drain_due(&mut self, window_end: SimulationTime) -> Vec<Event> {
        let mut due = Vec::new();
        while let Some(fire_time) = self.peek_fire_time() {
            if fire_time >= window_end {
                break;
            }
            due.push(self.heap.pop().expect("peeked entry must pop"));
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
