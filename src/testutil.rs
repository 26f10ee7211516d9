// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Small graphs shared between test modules.

use std::collections::HashMap;

use crate::graph::{CompactGraph, GraphBuilder, Way};

pub(crate) fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|&(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A triangle around the equator:
///
/// ```text
///   3 (0.001, 0)
///   |        \
///   | footway \ Valencia Street
///   |          \
///   1 --------- 2 (0, 0.001)
///    Market Street
/// ```
///
/// Edges 1-2 and 1-3 are ≈ 111.19 m, edge 2-3 is ≈ 157.25 m.
pub(crate) fn triangle_graph() -> CompactGraph {
    let coords: HashMap<i64, (f64, f64)> = [
        (1, (0.0, 0.0)),
        (2, (0.0, 0.001)),
        (3, (0.001, 0.0)),
    ]
    .into_iter()
    .collect();

    let ways = [
        Way {
            tags: tags(&[("highway", "residential"), ("name", "Market Street")]),
            node_refs: vec![1, 2],
        },
        Way {
            tags: tags(&[("highway", "residential"), ("name", "Valencia Street")]),
            node_refs: vec![2, 3],
        },
        Way {
            tags: tags(&[("highway", "footway")]),
            node_refs: vec![1, 3],
        },
    ];

    let mut builder = GraphBuilder::new();
    builder.add_ways(&ways, &coords);
    builder.build()
}

/// A Y shape: three arms meeting at node 10.
pub(crate) fn y_graph() -> CompactGraph {
    let coords: HashMap<i64, (f64, f64)> = [
        (10, (0.0, 0.0)),
        (11, (0.001, 0.0)),
        (12, (0.0, 0.001)),
        (13, (-0.001, -0.001)),
    ]
    .into_iter()
    .collect();

    let ways = [
        Way {
            tags: tags(&[("highway", "footway")]),
            node_refs: vec![10, 11],
        },
        Way {
            tags: tags(&[("highway", "residential"), ("name", "Fell Street")]),
            node_refs: vec![10, 12],
        },
        Way {
            tags: tags(&[("highway", "path")]),
            node_refs: vec![10, 13],
        },
    ];

    let mut builder = GraphBuilder::new();
    builder.add_ways(&ways, &coords);
    builder.build()
}
