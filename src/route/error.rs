// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Error conditions which may occur during route finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The start or end node doesn't exist in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(i64),

    /// The whole component reachable from the start was searched
    /// without visiting the end node.
    #[error("no path between the given nodes")]
    NoPath,
}
