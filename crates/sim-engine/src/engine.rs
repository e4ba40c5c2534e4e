// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! The simulation engine: windowed execution, barrier coordination, and
//! the object registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sim_topology::{GraphStore, ShadowId, TopologyRouter};
use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::config::EngineConfig;
use crate::event::{Event, HostQueue};
use crate::registry::{Namespace, Registry};
use crate::time::SimulationTime;
use crate::worker::{WorkItem, WorkerPool};

/// Engine lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initialized,
    Running,
    Draining,
    Killed,
}

/// A worker thread terminated abnormally while handling an event.
#[derive(Debug, Error)]
#[error("a worker thread terminated abnormally during dispatch")]
pub struct DispatchError;

/// Failure constructing an `Engine`: either the configuration itself was
/// invalid, or the topology it names failed to load. Both are fatal before
/// any engine state exists.
#[derive(Debug, Error)]
pub enum EngineInitError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Load(#[from] sim_topology::LoadError),
}

/// The scheduling and routing core. Owns the per-host event queues, the
/// worker pool, the global object registry, and the topology router used
/// by event handlers to query latency and reliability.
pub struct Engine {
    config: EngineConfig,
    router: Arc<TopologyRouter>,
    registry: Registry,
    host_queues: RwLock<HashMap<ShadowId, Arc<Mutex<HostQueue>>>>,
    pool: Option<WorkerPool>,
    state: EngineState,
    clock: SimulationTime,
    execute_window_start: SimulationTime,
    execute_window_end: SimulationTime,
    killed: Arc<AtomicBool>,
    force_shadow_context: AtomicBool,
}

impl Engine {
    /// Validates `config`, then loads the topology named by
    /// `config.graph_path` and constructs an `Engine` in the `Initialized`
    /// state. Propagates the failure without creating any engine state if
    /// either step fails.
    pub fn new(config: EngineConfig) -> Result<Self, EngineInitError> {
        config.validate()?;
        let graph = GraphStore::load(&config.graph_path)?;
        let router = Arc::new(TopologyRouter::new(graph));

        Ok(Self {
            config,
            router,
            registry: Registry::new(),
            host_queues: RwLock::new(HashMap::new()),
            pool: None,
            state: EngineState::Initialized,
            clock: SimulationTime::ZERO,
            execute_window_start: SimulationTime::ZERO,
            execute_window_end: SimulationTime::ZERO,
            killed: Arc::new(AtomicBool::new(false)),
            force_shadow_context: AtomicBool::new(false),
        })
    }

    pub fn router(&self) -> Arc<TopologyRouter> {
        self.router.clone()
    }

    pub fn setup_workers(&mut self, n: usize) {
        self.pool = Some(WorkerPool::spawn(n));
    }

    pub fn teardown_workers(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.teardown();
        }
    }

    fn queue_for(&self, host_id: ShadowId) -> Arc<Mutex<HostQueue>> {
        if let Some(queue) = self.host_queues.read().get(&host_id) {
            return queue.clone();
        }
        self.host_queues
            .write()
            .entry(host_id)
            .or_insert_with(|| Arc::new(Mutex::new(HostQueue::new())))
            .clone()
    }

    /// Enqueues `event` onto its destination host's queue.
    pub fn push_event(&self, event: Event) {
        let queue = self.queue_for(event.destination_host_id);
        queue.lock().push(event);
    }

    pub fn put<T: std::any::Any + Send + Sync>(&self, namespace: Namespace, id: u64, item: T) {
        self.registry.put(namespace, id, item);
    }

    pub fn get<T: std::any::Any + Send + Sync + Clone>(
        &self,
        namespace: Namespace,
        id: u64,
    ) -> Option<T> {
        self.registry.get(namespace, id)
    }

    pub fn generate_worker_id(&self) -> u64 {
        self.registry.generate_worker_id()
    }

    pub fn generate_node_id(&self) -> u64 {
        self.registry.generate_object_id()
    }

    pub fn get_min_time_jump(&self) -> SimulationTime {
        self.config.min_time_jump()
    }

    pub fn get_execution_barrier(&self) -> SimulationTime {
        self.execute_window_end
    }

    pub fn notify_node_processed(&self) {
        if let Some(pool) = &self.pool {
            pool.notify_processed();
        }
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Runs the engine to completion: advances windows until the clock
    /// reaches `end_time` or no events remain, then drains workers.
    /// Returns 0 on normal completion, nonzero if a worker failed.
    pub fn run(&mut self) -> i32 {
        if self.pool.is_none() {
            self.setup_workers(self.config.worker_threads);
        }
        self.state = EngineState::Running;
        let end_time = self.config.end_time();
        let min_time_jump = self.config.min_time_jump();

        // A host queue emptying mid-run does not mean no more events will
        // ever arrive (a window can still produce new events for other
        // hosts), so the only early-exit is the degenerate case where no
        // event was ever scheduled before the run started.
        if self.host_queues.read().is_empty() {
            trace!("no events scheduled, draining immediately");
        } else {
            loop {
                if self.killed.load(Ordering::SeqCst) {
                    break;
                }

                let window_end = min(end_time, self.execute_window_start + min_time_jump);
                self.execute_window_end = window_end;

                let due_hosts = self.hosts_due_before(window_end);
                if !due_hosts.is_empty() {
                    let pool = self.pool.as_ref().expect("workers set up at run start");
                    for host_id in &due_hosts {
                        let queue = self.queue_for(*host_id);
                        pool.dispatch(WorkItem {
                            host_id: *host_id,
                            queue,
                            window_end,
                        });
                    }
                    pool.wait_for_window(due_hosts.len());

                    if pool.has_panicked() {
                        error!(error = %DispatchError, "worker pool reported abnormal termination");
                        self.killed.store(true, Ordering::SeqCst);
                        break;
                    }

                    for event in pool.drain_new_events() {
                        self.push_event(event);
                    }
                }

                debug!(window_start = %self.execute_window_start, window_end = %window_end, "window advanced");
                self.execute_window_start = window_end;
                self.clock = window_end;

                if self.clock >= end_time {
                    info!(clock = %self.clock, "end time reached");
                    break;
                }
            }
        }

        self.state = EngineState::Draining;
        self.force_shadow_context.store(true, Ordering::SeqCst);
        let failed = self.killed.load(Ordering::SeqCst);
        self.teardown_workers();
        self.state = EngineState::Killed;

        if failed {
            error!("engine terminated due to worker failure");
            1
        } else {
            info!("engine run completed normally");
            0
        }
    }

    fn hosts_due_before(&self, window_end: SimulationTime) -> Vec<ShadowId> {
        self.host_queues
            .read()
            .iter()
            .filter_map(|(id, queue)| {
                let q = queue.lock();
                match q.peek_fire_time() {
                    Some(fire_time) if fire_time < window_end => Some(*id),
                    _ => None,
                }
            })
            .collect()
    }
}

fn min(a: SimulationTime, b: SimulationTime) -> SimulationTime {
    if a < b {
        a
    } else {
        b
    }
}
