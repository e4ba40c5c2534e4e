// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! The non-reentrant graph store.
//!
//! `petgraph` is not itself reentrancy-hostile, but the access discipline
//! here treats it as if the underlying library were: every read or write,
//! including attribute lookups and shortest-path computation, goes through
//! a single exclusive lock. This mirrors how an external, non-thread-safe
//! graph primitive must be wrapped, and the scoped-access guard makes the
//! precondition a type rather than a comment — `vertex_attr`/`edge_attr`
//! exist only as methods on the guard, so calling them without the lock
//! held does not compile.

use std::collections::HashMap;
use std::path::Path as FsPath;

use parking_lot::{Mutex, MutexGuard};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{error, info};

use crate::error::{GraphLibraryError, LoadError};
use crate::graphml::{self, EdgeRecord, VertexRecord};

/// A vertex in the loaded topology.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub external_id: String,
    pub vertex_type: String,
    pub is_poi: bool,
    pub ip: Option<std::net::Ipv4Addr>,
    pub geocode: Option<String>,
    pub bandwidth_up_kbps: Option<f64>,
    pub bandwidth_down_kbps: Option<f64>,
    pub packet_loss: f64,
}

/// An edge in the loaded topology.
#[derive(Debug, Clone)]
pub struct EdgeWeight {
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub packet_loss: f64,
}

/// Owns the parsed graph. All access, including from [`crate::router`],
/// must go through [`GraphStore::with_graph`].
pub struct GraphStore {
    inner: Mutex<DiGraph<Vertex, EdgeWeight>>,
}

/// A scoped exclusive handle to the graph. Exists only for the duration
/// of the closure passed to [`GraphStore::with_graph`]; attribute
/// accessors are methods on this guard so they cannot be called without
/// the lock held.
pub struct GraphAccess<'a> {
    graph: MutexGuard<'a, DiGraph<Vertex, EdgeWeight>>,
}

impl GraphStore {
    /// Parses a GraphML file, validates the required schema and strong
    /// connectivity, and constructs the store. Fails fast: any validation
    /// error aborts construction with no partial store left behind.
    pub fn load<P: AsRef<FsPath>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading topology graph");

        let contents = std::fs::read_to_string(path)?;
        let (vertices, edges) = graphml::parse(&contents)?;

        let mut graph = DiGraph::<Vertex, EdgeWeight>::new();
        let mut index_by_id = HashMap::with_capacity(vertices.len());

        for v in vertices {
            let vertex = vertex_from_record(v)?;
            let idx = graph.add_node(vertex);
            let id = graph[idx].external_id.clone();
            index_by_id.insert(id, idx);
        }

        for e in edges {
            let src = *index_by_id
                .get(&e.source)
                .ok_or_else(|| LoadError::ParseError(format!("edge references unknown source vertex '{}'", e.source)))?;
            let dst = *index_by_id
                .get(&e.target)
                .ok_or_else(|| LoadError::ParseError(format!("edge references unknown target vertex '{}'", e.target)))?;
            graph.add_edge(src, dst, edge_weight_from_record(e)?);
        }

        let cluster_count = petgraph::algo::connected_components(&graph);
        if cluster_count != 1 {
            error!(cluster_count, "topology graph is not strongly connected");
            return Err(LoadError::NotConnected { cluster_count });
        }

        info!(
            vertices = graph.node_count(),
            edges = graph.edge_count(),
            "topology graph loaded"
        );

        Ok(Self {
            inner: Mutex::new(graph),
        })
    }

    /// Scoped exclusive access. The lock is released on every exit path,
    /// including panics unwinding through the closure.
    pub fn with_graph<R>(&self, f: impl FnOnce(&mut GraphAccess<'_>) -> R) -> R {
        let mut access = GraphAccess {
            graph: self.inner.lock(),
        };
        f(&mut access)
    }
}

impl<'a> GraphAccess<'a> {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn node_indices(&self) -> Vec<NodeIndex> {
        self.graph.node_indices().collect()
    }

    /// The vertex at `idx`. `Err` if `idx` does not name a vertex currently
    /// in the graph — it should not happen given the indices this crate
    /// itself hands out, but a foreign or stale index must not panic the
    /// holder of the graph lock.
    pub fn vertex(&self, idx: NodeIndex) -> Result<&Vertex, GraphLibraryError> {
        self.graph
            .node_weight(idx)
            .ok_or(GraphLibraryError::VertexOutOfBounds(idx.index()))
    }

    pub fn edge_weight(&self, idx: EdgeIndex) -> Result<&EdgeWeight, GraphLibraryError> {
        self.graph
            .edge_weight(idx)
            .ok_or(GraphLibraryError::EdgeOutOfBounds(idx.index()))
    }

    /// The directed edge from `src` to `dst`, if one exists.
    pub fn find_edge(&self, src: NodeIndex, dst: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(src, dst)
    }

    /// The edge sequence along the shortest path from `src` to `dst`,
    /// reconstructed by re-running Dijkstra with a predecessor map.
    /// `None` if `dst` is unreachable from `src`.
    pub fn shortest_path_edges(&self, src: NodeIndex, dst: NodeIndex) -> Option<Vec<EdgeIndex>> {
        if src == dst {
            return Some(Vec::new());
        }

        let mut dist: HashMap<NodeIndex, f64> = HashMap::new();
        let mut prev: HashMap<NodeIndex, (NodeIndex, EdgeIndex)> = HashMap::new();
        let mut visited: std::collections::HashSet<NodeIndex> = std::collections::HashSet::new();
        let mut heap = std::collections::BinaryHeap::new();

        dist.insert(src, 0.0);
        heap.push(MinHeapEntry {
            cost: 0.0,
            node: src,
        });

        while let Some(MinHeapEntry { cost, node }) = heap.pop() {
            if !visited.insert(node) {
                continue;
            }
            if node == dst {
                break;
            }
            for edge in self.graph.edges(node) {
                let next = edge.target();
                let next_cost = cost + edge.weight().latency_ms;
                if next_cost < *dist.get(&next).unwrap_or(&f64::INFINITY) {
                    dist.insert(next, next_cost);
                    prev.insert(next, (node, edge.id()));
                    heap.push(MinHeapEntry {
                        cost: next_cost,
                        node: next,
                    });
                }
            }
        }

        if !dist.contains_key(&dst) {
            return None;
        }

        let mut edges = Vec::new();
        let mut cur = dst;
        while cur != src {
            let (prev_node, edge_id) = prev.get(&cur)?;
            edges.push(*edge_id);
            cur = *prev_node;
        }
        edges.reverse();
        Some(edges)
    }
}

#[derive(PartialEq)]
struct MinHeapEntry {
    cost: f64,
    node: NodeIndex,
}

impl Eq for MinHeapEntry {}

impl Ord for MinHeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so BinaryHeap (a max-heap) pops the smallest cost first.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl PartialOrd for MinHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn vertex_from_record(v: VertexRecord) -> Result<Vertex, LoadError> {
    let is_poi = v.id.contains("poi");

    if is_poi {
        let missing = |attr: &str| LoadError::MissingAttribute {
            element: v.id.clone(),
            attribute: attr.to_string(),
        };
        let ip = v
            .ip
            .as_deref()
            .ok_or_else(|| missing("ip"))?
            .parse()
            .map_err(|_| LoadError::ParseError(format!("vertex '{}' has invalid ip", v.id)))?;
        let geocode = v.geocode.clone().ok_or_else(|| missing("geocode"))?;
        let bandwidth_up_kbps = v.bandwidthup.ok_or_else(|| missing("bandwidthup"))?;
        let bandwidth_down_kbps = v.bandwidthdown.ok_or_else(|| missing("bandwidthdown"))?;
        let packet_loss = v.packetloss.ok_or_else(|| missing("packetloss"))?;

        Ok(Vertex {
            external_id: v.id,
            vertex_type: v.vertex_type,
            is_poi: true,
            ip: Some(ip),
            geocode: Some(geocode),
            bandwidth_up_kbps: Some(bandwidth_up_kbps),
            bandwidth_down_kbps: Some(bandwidth_down_kbps),
            packet_loss,
        })
    } else {
        Ok(Vertex {
            external_id: v.id,
            vertex_type: v.vertex_type,
            is_poi: false,
            ip: None,
            geocode: None,
            bandwidth_up_kbps: None,
            bandwidth_down_kbps: None,
            packet_loss: 0.0,
        })
    }
}

fn edge_weight_from_record(e: EdgeRecord) -> Result<EdgeWeight, LoadError> {
    let missing = |attr: &str| LoadError::MissingAttribute {
        element: format!("{}->{}", e.source, e.target),
        attribute: attr.to_string(),
    };
    Ok(EdgeWeight {
        latency_ms: e.latency.ok_or_else(|| missing("latency"))?,
        jitter_ms: e.jitter.ok_or_else(|| missing("jitter"))?,
        packet_loss: e.packetloss.ok_or_else(|| missing("packetloss"))?,
    })
}
