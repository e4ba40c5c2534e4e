// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! The public attach/detach/latency/reliability surface.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Instant;

use parking_lot::RwLock;
use petgraph::graph::NodeIndex;
use rand::Rng;
use tracing::{debug, error, warn};

use crate::address::{Address, ShadowId};
use crate::cache::PathCache;
use crate::error::{AttachError, GraphLibraryError, NoCandidate, RouteError};
use crate::graph::{GraphAccess, GraphStore};
use crate::path::Path;

/// Optional filters narrowing the candidate PoI set during [`TopologyRouter::attach`].
/// A hint that is set but matches nothing makes the attach fail with
/// [`NoCandidate`] rather than silently falling back to an unfiltered pick.
#[derive(Debug, Clone, Default)]
pub struct AttachHints {
    /// Matched by longest-prefix match against each PoI's advertised IP.
    /// Written as `a.b.c.d/prefix_len`; a bare `a.b.c.d` is shorthand for
    /// `/32` (an exact address match).
    pub ip_hint: Option<String>,
    /// Matched by exact equality against the PoI's `geocode`.
    pub cluster_hint: Option<String>,
    /// Matched by exact equality against the PoI's `type`.
    pub type_hint: Option<String>,
}

/// Holds the host-to-vertex attachment table, the graph store, and the
/// path cache, and answers latency/reliability/routability queries.
pub struct TopologyRouter {
    graph: GraphStore,
    cache: PathCache,
    attachments: RwLock<HashMap<ShadowId, NodeIndex>>,
}

impl TopologyRouter {
    pub fn new(graph: GraphStore) -> Self {
        Self {
            graph,
            cache: PathCache::new(),
            attachments: RwLock::new(HashMap::new()),
        }
    }

    /// Enumerates PoI vertices, filters by `hints`, samples one uniformly
    /// using `rng`, and records the chosen vertex for `address`. Returns
    /// the chosen vertex's advertised `(bandwidth_down, bandwidth_up)` in
    /// kbit/s.
    pub fn attach(
        &self,
        address: Address,
        rng: &mut impl Rng,
        hints: &AttachHints,
    ) -> Result<(f64, f64), AttachError> {
        let candidate = self.graph.with_graph(|g| select_candidate(g, hints, rng))?;
        let Some((idx, bw_down, bw_up)) = candidate else {
            return Err(NoCandidate.into());
        };

        self.attachments.write().insert(address.id, idx);
        debug!(address = %address.id, vertex = idx.index(), "host attached");
        Ok((bw_down, bw_up))
    }

    /// Removes the host's vertex mapping. Cached paths referencing the
    /// address are left in place: the topology is static and the ID will
    /// not be reissued within a run, so stale entries are harmless.
    pub fn detach(&self, address: Address) {
        self.attachments.write().remove(&address.id);
        debug!(address = %address.id, "host detached");
    }

    pub fn get_latency(&self, src: Address, dst: Address) -> f64 {
        match self.route(src, dst) {
            Ok(path) => path.latency_ms,
            Err(_) => -1.0,
        }
    }

    pub fn get_reliability(&self, src: Address, dst: Address) -> f64 {
        match self.route(src, dst) {
            Ok(path) => path.reliability,
            Err(_) => -1.0,
        }
    }

    pub fn is_routable(&self, src: Address, dst: Address) -> bool {
        self.route(src, dst).is_ok()
    }

    /// Consults the cache; on miss, computes under the graph lock, releases
    /// it, then inserts into the cache. The graph lock and the cache lock
    /// are never held simultaneously.
    fn route(&self, src: Address, dst: Address) -> Result<Path, RouteError> {
        let attachments = self.attachments.read();
        let src_idx = *attachments
            .get(&src.id)
            .ok_or(RouteError::NotAttached(src.id))?;
        let dst_idx = *attachments
            .get(&dst.id)
            .ok_or(RouteError::NotAttached(dst.id))?;
        drop(attachments);

        if let Some(path) = self.cache.lookup(src.id, dst.id) {
            return Ok(path);
        }

        let started = Instant::now();
        let computed = self.graph.with_graph(|g| compute_path(g, src_idx, dst_idx));
        let elapsed = started.elapsed();
        let computed = computed.map_err(|e| {
            error!(src = %src.id, dst = %dst.id, error = %e, "graph primitive failed during route computation");
            e
        })?;

        match computed {
            Some(path) => {
                self.cache.insert(src.id, dst.id, path, elapsed);
                Ok(path)
            }
            None => {
                warn!(src = %src.id, dst = %dst.id, "no route between attached hosts");
                Err(RouteError::Unreachable)
            }
        }
    }
}

/// Longest-prefix match: `hint` is `a.b.c.d/prefix_len` (prefix_len defaults
/// to 32, an exact match, if omitted). Mirrors the bitwise-AND-against-a-mask
/// semantics of the original topology library's prefix match rather than
/// comparing the addresses' decimal string representations, so a hint like
/// `10.1.128.0/20` matches `10.1.135.9` but not `10.1.144.9` even though the
/// dotted-decimal prefix `10.1.` is shared by all three.
fn ip_matches_prefix(candidate: Ipv4Addr, hint: &str) -> bool {
    let (addr_part, prefix_len) = match hint.split_once('/') {
        Some((addr, len)) => (addr, len.parse::<u32>().unwrap_or(32)),
        None => (hint, 32),
    };
    let Ok(hint_addr) = addr_part.parse::<Ipv4Addr>() else {
        return false;
    };
    let prefix_len = prefix_len.min(32);
    let mask: u32 = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len)
    };
    (u32::from(candidate) & mask) == (u32::from(hint_addr) & mask)
}

fn select_candidate(
    g: &mut GraphAccess<'_>,
    hints: &AttachHints,
    rng: &mut impl Rng,
) -> Result<Option<(NodeIndex, f64, f64)>, GraphLibraryError> {
    let mut candidates: Vec<NodeIndex> = Vec::new();
    for idx in g.node_indices() {
        let v = g.vertex(idx)?;
        if !v.is_poi {
            continue;
        }
        if let Some(ip_hint) = &hints.ip_hint {
            let Some(ip) = v.ip else { continue };
            if !ip_matches_prefix(ip, ip_hint) {
                continue;
            }
        }
        if let Some(cluster_hint) = &hints.cluster_hint {
            if v.geocode.as_deref() != Some(cluster_hint.as_str()) {
                continue;
            }
        }
        if let Some(type_hint) = &hints.type_hint {
            if v.vertex_type != *type_hint {
                continue;
            }
        }
        candidates.push(idx);
    }

    if candidates.is_empty() {
        return Ok(None);
    }

    // A direct index on `floor(N*u)` for uniform `u in [0, 1)`, clamped to
    // the last valid index. Avoids the off-by-one that `round` would give
    // on `u == 1.0` (out-of-bounds at index N).
    let u: f64 = rng.gen_range(0.0..1.0);
    let idx = ((candidates.len() as f64) * u).floor() as usize;
    let idx = idx.min(candidates.len() - 1);
    let chosen = candidates[idx];

    let v = g.vertex(chosen)?;
    Ok(Some((
        chosen,
        v.bandwidth_down_kbps.unwrap_or(0.0),
        v.bandwidth_up_kbps.unwrap_or(0.0),
    )))
}

fn compute_path(
    g: &mut GraphAccess<'_>,
    src: NodeIndex,
    dst: NodeIndex,
) -> Result<Option<Path>, GraphLibraryError> {
    if src == dst {
        let reliability = 1.0 - g.vertex(src)?.packet_loss;
        return Ok(Some(Path::same_vertex(reliability)));
    }

    let Some(edges) = g.shortest_path_edges(src, dst) else {
        return Ok(None);
    };

    let mut latency = 0.0;
    let mut reliability = 1.0 - g.vertex(src)?.packet_loss;
    for edge_idx in edges {
        let weight = g.edge_weight(edge_idx)?;
        latency += weight.latency_ms;
        reliability *= 1.0 - weight.packet_loss;
    }
    reliability *= 1.0 - g.vertex(dst)?.packet_loss;

    Ok(Some(Path::new(latency, reliability)))
}
