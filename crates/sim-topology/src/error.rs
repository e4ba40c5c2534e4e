// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! Error kinds for graph loading and routing.

use thiserror::Error;

/// Failure modes for loading and validating a topology graph.
///
/// Fatal at construction: a `LoadError` means no `GraphStore` is produced.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading topology file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse topology: {0}")]
    ParseError(String),

    #[error("graph is not strongly connected: {cluster_count} clusters found")]
    NotConnected { cluster_count: usize },

    #[error("vertex or edge missing required attribute '{attribute}' (element: {element})")]
    MissingAttribute { element: String, attribute: String },
}

/// Routing failures recovered locally by the caller.
///
/// Never propagated as a hard error: query methods log at `warn` and
/// return their defined failure value (`-1`, `false`, etc).
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("address {0:?} is not attached to any vertex")]
    NotAttached(crate::address::ShadowId),

    #[error("no path exists between the requested vertices")]
    Unreachable,

    #[error(transparent)]
    GraphLibrary(#[from] GraphLibraryError),
}

/// The underlying graph primitive reported a non-success result during a
/// query. Logged at `error`; the caller's query returns its failure value
/// and the graph lock is released normally. The path cache is not poisoned.
#[derive(Debug, Error)]
pub enum GraphLibraryError {
    #[error("vertex index {0} out of bounds")]
    VertexOutOfBounds(usize),

    #[error("edge index {0} out of bounds")]
    EdgeOutOfBounds(usize),
}

/// `attach()` found no PoI vertex satisfying the supplied hints.
#[derive(Debug, Error)]
#[error("no candidate vertex satisfies the supplied attach hints")]
pub struct NoCandidate;

/// `attach()`'s failure modes: either no candidate satisfied the hints, or
/// the graph primitive itself reported a non-success result while scanning
/// candidates.
#[derive(Debug, Error)]
pub enum AttachError {
    #[error(transparent)]
    NoCandidate(#[from] NoCandidate),

    #[error(transparent)]
    GraphLibrary(#[from] GraphLibraryError),
}
