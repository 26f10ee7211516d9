// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Novelty-weighted pedestrian routing over [OpenStreetMap](https://www.openstreetmap.org/) data.
//!
//! Walkable ways are compiled into a compact CSR graph with per-edge
//! street-name metadata, persisted in a flat binary format. Routing answers
//! the question "walk from A to B, preferring streets I have not walked yet,
//! without taking much longer than the shortest path": a baseline A* run is
//! followed by penalty-biased searches that inflate previously walked edges,
//! with the penalty tuned by bisection against the caller's novelty and
//! overhead bounds. Walked edges live in a durable SQLite history keyed by
//! canonical undirected edge pairs.
//!
//! # Example
//!
//! ```no_run
//! let graph = wander::load_graph("data/walk_graph.bin")
//!     .expect("failed to load graph");
//! let history = wander::WalkHistory::open("data/walk_history.db")
//!     .expect("failed to open walk history");
//! let walked = history.walked_edges().expect("failed to read walk history");
//!
//! let (src, _) = graph.find_nearest_node(37.7955, -122.3937).unwrap();
//! let (tgt, _) = graph.find_nearest_node(37.7596, -122.4269).unwrap();
//!
//! let route = wander::novelty_route(
//!     &graph,
//!     graph.node_id(src),
//!     graph.node_id(tgt),
//!     &walked,
//!     wander::NoveltyParams::default(),
//! )
//! .expect("failed to find route");
//!
//! println!("{:.0} m, {:.0}% novel", route.distance, route.novelty * 100.0);
//! ```

mod geo;
mod graph;
mod history;
mod kd;
mod route;

#[cfg(test)]
mod testutil;

pub use geo::{bearing, haversine};
pub use graph::{
    build_or_load, load_graph, save_graph, BoundingBox, CompactGraph, FormatError, GraphBuilder,
    GraphError, Way,
};
pub use history::{edge_key, HistoryError, HistoryStats, WalkHistory};
pub use kd::{KDTree, PlanePoint};
pub use route::{
    generate_instructions, novelty_route, path_to_edges, shortest_path, Instruction, NoveltyParams,
    RouteError, RouteResult, TurnDirection,
};
