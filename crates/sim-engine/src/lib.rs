// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! Windowed, barrier-synchronized discrete-event scheduling core.
//!
//! Virtual hosts execute on simulated time advanced in safe jumps. The
//! [`Engine`] dispatches each host's due events to a [`WorkerPool`] worker,
//! waits for the window's barrier, and advances the clock. Event handlers
//! may query a [`sim_topology::TopologyRouter`] for latency and
//! reliability and emit further events, subject to the `min_time_jump`
//! ordering guarantee enforced by the window.

pub mod config;
pub mod engine;
pub mod event;
pub mod registry;
pub mod time;
pub mod worker;

pub use config::{ConfigError, EngineConfig};
pub use engine::{DispatchError, Engine, EngineInitError, EngineState};
pub use event::{Event, HostQueue};
pub use registry::{Namespace, Registry};
pub use time::SimulationTime;
pub use worker::{WorkItem, WorkerPool};
