// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{BinaryHeap, HashSet};

use super::RouteError;
use crate::geo::haversine;
use crate::graph::CompactGraph;
use crate::history::edge_key;

/// Sentinel in the parent-pointer array for "not reached yet".
const NO_PARENT: i32 = -1;

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    f: f64,
    g: f64,
    seq: u64,
    idx: u32,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.g == other.g && self.seq == other.seq
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // NOTE: We revert the order of the f and g comparisons,
        // as lower scores are considered better ("higher"),
        // and Rust's BinaryHeap is a max-heap. On fully equal scores,
        // the most recently inserted item pops first.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap()
            .then_with(|| other.g.partial_cmp(&self.g).unwrap())
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Search-time cost inflation for previously walked edges.
struct Penalty<'a> {
    walked: &'a HashSet<(i64, i64)>,
    factor: f64,
}

fn reconstruct(came_from: &[i32], src_idx: u32, tgt_idx: u32) -> Vec<u32> {
    let mut path = Vec::new();
    let mut cur = tgt_idx as i32;
    while cur != NO_PARENT {
        path.push(cur as u32);
        if cur as u32 == src_idx {
            break;
        }
        cur = came_from[cur as usize];
    }
    path.reverse();
    return path;
}

fn to_osm_ids(g: &CompactGraph, indices: &[u32]) -> Vec<i64> {
    indices.iter().map(|&idx| g.node_id(idx)).collect()
}

/// Sums the unpenalized edge weights along a path of dense indices.
fn path_distance(g: &CompactGraph, indices: &[u32]) -> f64 {
    indices
        .windows(2)
        .map(|w| g.edge_weight(w[0], w[1]).map(|weight| weight as f64).unwrap_or(0.0))
        .sum()
}

/// Parent-pointer A* over dense node indices.
///
/// Queue entries carry only `(f, g, seq, idx)`; paths are rebuilt from a
/// single `came_from` array once the target pops. When a [Penalty] is given,
/// the relaxation cost of a walked edge is its weight times the penalty
/// factor; the heuristic stays the plain haversine to the target, which
/// remains admissible with respect to the unpenalized costs.
///
/// Returns the path of dense indices plus the accumulated (possibly
/// penalized) cost at the target, or `None` when the target is unreachable.
fn search(
    g: &CompactGraph,
    src_idx: u32,
    tgt_idx: u32,
    penalty: Option<&Penalty>,
) -> Option<(Vec<u32>, f64)> {
    let (tgt_lat, tgt_lon) = g.node_coords(tgt_idx);

    let mut came_from = vec![NO_PARENT; g.num_nodes()];
    let mut g_score = vec![f64::INFINITY; g.num_nodes()];
    g_score[src_idx as usize] = 0.0;

    let mut seq: u64 = 0;
    let mut queue = BinaryHeap::new();
    queue.push(QueueItem {
        f: 0.0,
        g: 0.0,
        seq,
        idx: src_idx,
    });

    while let Some(item) = queue.pop() {
        if item.idx == tgt_idx {
            return Some((reconstruct(&came_from, src_idx, tgt_idx), item.g));
        }

        // Contrary to the wikipedia definition, we might keep multiple items in the queue for the same node.
        if item.g > g_score[item.idx as usize] {
            continue;
        }

        let current_osm = g.node_id(item.idx);
        let (targets, weights) = g.neighbors(item.idx);
        for (&target, &weight) in targets.iter().zip(weights) {
            let neighbor = target as u32;

            let mut cost = weight as f64;
            if let Some(penalty) = penalty {
                if penalty
                    .walked
                    .contains(&edge_key(current_osm, g.node_id(neighbor)))
                {
                    cost *= penalty.factor;
                }
            }

            let new_g = item.g + cost;
            if new_g < g_score[neighbor as usize] {
                g_score[neighbor as usize] = new_g;
                came_from[neighbor as usize] = item.idx as i32;
                let (lat, lon) = g.node_coords(neighbor);
                seq += 1;
                queue.push(QueueItem {
                    f: new_g + haversine(lat, lon, tgt_lat, tgt_lon),
                    g: new_g,
                    seq,
                    idx: neighbor,
                });
            }
        }
    }

    None
}

/// Uses the [A* algorithm](https://en.wikipedia.org/wiki/A*_search_algorithm)
/// with a haversine heuristic to find the shortest route between two nodes.
///
/// Returns the path as OSM node ids along with its length in meters.
/// A source equal to the target yields the single-node path of length 0.
pub fn shortest_path(
    g: &CompactGraph,
    source: i64,
    target: i64,
) -> Result<(Vec<i64>, f64), RouteError> {
    if source == target {
        return Ok((vec![source], 0.0));
    }

    let src_idx = g
        .idx_for_osm_id(source)
        .map_err(|_| RouteError::UnknownNode(source))?;
    let tgt_idx = g
        .idx_for_osm_id(target)
        .map_err(|_| RouteError::UnknownNode(target))?;

    match search(g, src_idx, tgt_idx, None) {
        Some((indices, distance)) => Ok((to_osm_ids(g, &indices), distance)),
        None => Err(RouteError::NoPath),
    }
}

/// A* with walked-edge costs inflated by `factor` during relaxation.
///
/// The returned distance is the path's true, unpenalized length: the penalty
/// is a search-time bias only. `None` means the target is unreachable.
pub(super) fn penalized_astar(
    g: &CompactGraph,
    source: i64,
    target: i64,
    walked: &HashSet<(i64, i64)>,
    factor: f64,
) -> Result<Option<(Vec<i64>, f64)>, RouteError> {
    if source == target {
        return Ok(Some((vec![source], 0.0)));
    }

    let src_idx = g
        .idx_for_osm_id(source)
        .map_err(|_| RouteError::UnknownNode(source))?;
    let tgt_idx = g
        .idx_for_osm_id(target)
        .map_err(|_| RouteError::UnknownNode(target))?;

    let penalty = Penalty { walked, factor };
    Ok(search(g, src_idx, tgt_idx, Some(&penalty)).map(|(indices, _)| {
        let distance = path_distance(g, &indices);
        (to_osm_ids(g, &indices), distance)
    }))
}
