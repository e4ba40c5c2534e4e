// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! Long-lived worker threads and the window barrier.
//!
//! Workers are plain `std::thread` handles, not a thread-pool crate: each
//! carries private scratch state (its worker ID) for its whole lifetime,
//! and is dispatched one host's due events at a time over a channel.
//! `nodes_to_process` and the `idle` condition variable implement the
//! barrier the Engine waits on between windows.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use sim_topology::ShadowId;
use tracing::{error, info};

use crate::event::{Event, HostQueue};
use crate::time::SimulationTime;

/// One host's due work, handed to a worker for the current window.
pub struct WorkItem {
    pub host_id: ShadowId,
    pub queue: Arc<Mutex<HostQueue>>,
    pub window_end: SimulationTime,
}

/// A pool of long-lived worker threads draining per-host event queues.
pub struct WorkerPool {
    dispatch_tx: Sender<WorkItem>,
    new_events_rx: Receiver<Event>,
    handles: Vec<JoinHandle<()>>,
    killed: Arc<AtomicBool>,
    panicked: Arc<AtomicBool>,
    nodes_to_process: Arc<AtomicIsize>,
    idle: Arc<(Mutex<bool>, Condvar)>,
}

impl WorkerPool {
    pub fn spawn(worker_threads: usize) -> Self {
        let (dispatch_tx, dispatch_rx) = crossbeam_channel::unbounded::<WorkItem>();
        let (new_events_tx, new_events_rx) = crossbeam_channel::unbounded::<Event>();
        let killed = Arc::new(AtomicBool::new(false));
        let panicked = Arc::new(AtomicBool::new(false));
        let nodes_to_process = Arc::new(AtomicIsize::new(0));
        let idle = Arc::new((Mutex::new(false), Condvar::new()));

        let mut handles = Vec::with_capacity(worker_threads);
        for worker_id in 0..worker_threads {
            let dispatch_rx = dispatch_rx.clone();
            let new_events_tx = new_events_tx.clone();
            let killed = killed.clone();
            let panicked = panicked.clone();
            let nodes_to_process = nodes_to_process.clone();
            let idle = idle.clone();

            let handle = thread::Builder::new()
                .name(format!("sim-worker-{worker_id}"))
                .spawn(move || {
                    info!(worker_id, "worker started");
                    worker_loop(
                        worker_id,
                        &dispatch_rx,
                        &new_events_tx,
                        &killed,
                        &panicked,
                        &nodes_to_process,
                        &idle,
                    );
                    info!(worker_id, "worker stopped");
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        Self {
            dispatch_tx,
            new_events_rx,
            handles,
            killed,
            panicked,
            nodes_to_process,
            idle,
        }
    }

    /// Dispatches one host's due-event work to the pool. Must be called
    /// before `wait_for_window` for every host counted in its
    /// `nodes_to_process` total.
    pub fn dispatch(&self, item: WorkItem) {
        self.dispatch_tx
            .send(item)
            .expect("worker pool channel closed while dispatching");
    }

    /// Sets the barrier count and blocks until every dispatched host has
    /// been drained by a worker.
    pub fn wait_for_window(&self, live_host_count: usize) {
        self.nodes_to_process
            .store(live_host_count as isize, Ordering::SeqCst);
        if live_host_count == 0 {
            return;
        }

        let (lock, cvar) = &*self.idle;
        let mut idle = lock.lock();
        *idle = false;
        while !*idle {
            cvar.wait(&mut idle);
        }
    }

    /// Drains events emitted by workers during the window just completed.
    pub fn drain_new_events(&self) -> Vec<Event> {
        self.new_events_rx.try_iter().collect()
    }

    /// True if any worker terminated abnormally (`DispatchError`).
    pub fn has_panicked(&self) -> bool {
        self.panicked.load(Ordering::SeqCst)
    }

    pub fn set_killed(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Manually decrements the barrier count, signaling the Engine if this
    /// was the last outstanding host. Exposed for callers (e.g. plugin
    /// callbacks) that acknowledge completion outside the normal dispatch
    /// path; the worker loop itself calls the same decrement-and-signal
    /// logic after draining a host's due events.
    pub fn notify_processed(&self) {
        decrement_and_maybe_signal(&self.nodes_to_process, &self.idle);
    }

    /// Drops the dispatch sender (closing the channel, since workers hold
    /// only receiver clones) and joins every worker thread.
    pub fn teardown(self) {
        self.killed.store(true, Ordering::SeqCst);
        let WorkerPool {
            dispatch_tx,
            handles,
            ..
        } = self;
        drop(dispatch_tx);
        for handle in handles {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_id: usize,
    dispatch_rx: &Receiver<WorkItem>,
    new_events_tx: &Sender<Event>,
    killed: &Arc<AtomicBool>,
    panicked: &Arc<AtomicBool>,
    nodes_to_process: &Arc<AtomicIsize>,
    idle: &Arc<(Mutex<bool>, Condvar)>,
) {
    while let Ok(item) = dispatch_rx.recv() {
        if !killed.load(Ordering::SeqCst) {
            let due = item.queue.lock().drain_due(item.window_end);
            for event in due {
                let result = catch_unwind(AssertUnwindSafe(|| (event.payload)()));
                match result {
                    Ok(new_events) => {
                        for ev in new_events {
                            let _ = new_events_tx.send(ev);
                        }
                    }
                    Err(_) => {
                        error!(worker_id, host = %item.host_id, "worker panicked handling event");
                        panicked.store(true, Ordering::SeqCst);
                        killed.store(true, Ordering::SeqCst);
                    }
                }
            }
        }

        decrement_and_maybe_signal(nodes_to_process, idle);
    }
}

/// Decrements `nodes_to_process`; if the post-decrement value reaches
/// zero, sets `idle` and wakes the Engine. The check is on the
/// post-decrement value, never a separate read-then-write, so two
/// workers racing to finish last cannot both observe a nonzero count.
fn decrement_and_maybe_signal(nodes_to_process: &Arc<AtomicIsize>, idle: &Arc<(Mutex<bool>, Condvar)>) {
    let remaining = nodes_to_process.fetch_sub(1, Ordering::SeqCst) - 1;
    if remaining <= 0 {
        let (lock, cvar) = &**idle;
        let mut guard = lock.lock();
        *guard = true;
        cvar.notify_one();
    }
}
