// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! The two-level shortest-path cache.
//!
//! Keyed `srcID -> dstID -> Path`. The nested map matches the access
//! pattern of a host querying many destinations from the same source in
//! a burst, and lets `clear()` drop the whole outer level cheaply.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

use crate::address::ShadowId;
use crate::path::Path;

#[derive(Default)]
struct CacheState {
    entries: HashMap<ShadowId, HashMap<ShadowId, Path>>,
    cumulative_compute_time: Duration,
}

/// Reader/writer-protected path cache. The topology is static, so entries
/// carry no TTL and are only ever dropped wholesale via [`PathCache::clear`].
pub struct PathCache {
    state: RwLock<CacheState>,
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PathCache {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn lookup(&self, src: ShadowId, dst: ShadowId) -> Option<Path> {
        let state = self.state.read();
        state.entries.get(&src).and_then(|row| row.get(&dst)).copied()
    }

    /// Publishes `path` for `(src, dst)`, recording `compute_time` spent
    /// producing it. If a concurrent insert already won the race, the
    /// existing entry is kept and this caller's value is discarded —
    /// acceptable because shortest paths are deterministic for a static
    /// topology, so the two values are equal anyway.
    pub fn insert(&self, src: ShadowId, dst: ShadowId, path: Path, compute_time: Duration) {
        let mut state = self.state.write();
        state.cumulative_compute_time += compute_time;
        state
            .entries
            .entry(src)
            .or_default()
            .entry(dst)
            .or_insert(path);
    }

    /// Drops every cached entry and logs the cumulative CPU time spent
    /// computing them since the last clear.
    pub fn clear(&self) {
        let mut state = self.state.write();
        let spent = state.cumulative_compute_time;
        state.entries.clear();
        state.cumulative_compute_time = Duration::ZERO;
        info!(cumulative_compute_time_ms = spent.as_secs_f64() * 1000.0, "path cache cleared");
    }
}
