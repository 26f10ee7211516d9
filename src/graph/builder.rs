// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::info;

use super::CompactGraph;
use crate::geo::haversine;

/// Highway classes usable by pedestrians.
const WALKABLE_HIGHWAYS: &[&str] = &[
    "footway",
    "path",
    "pedestrian",
    "residential",
    "living_street",
    "tertiary",
    "secondary",
    "primary",
    "trunk",
    "steps",
    "cycleway",
    "unclassified",
    "service",
    "track",
    "tertiary_link",
    "secondary_link",
    "primary_link",
];

/// Highway classes never used for walking, regardless of other tags.
const EXCLUDED_HIGHWAYS: &[&str] = &["motorway", "motorway_link"];

/// An [OSM way](https://wiki.openstreetmap.org/wiki/Way) as delivered by the
/// external PBF layer: tags plus an ordered list of node references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Way {
    pub tags: HashMap<String, String>,
    pub node_refs: Vec<i64>,
}

/// A geographic bounding box, inclusive on all four sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.min_lat <= lat && lat <= self.max_lat && self.min_lon <= lon && lon <= self.max_lon
    }
}

/// Checks whether a tagged way may be used for walking.
///
/// A way is walkable iff its `highway` class is in the walkable set, and
/// neither `access=private`/`access=no` (unless overridden by an explicit
/// foot allowance) nor `foot=no` prohibit pedestrians.
pub fn way_is_walkable(tags: &HashMap<String, String>) -> bool {
    let highway = match tags.get("highway") {
        Some(h) => h.as_str(),
        None => return false,
    };
    if EXCLUDED_HIGHWAYS.contains(&highway) || !WALKABLE_HIGHWAYS.contains(&highway) {
        return false;
    }

    let access = tags.get("access").map(|v| v.as_str()).unwrap_or("");
    let foot = tags.get("foot").map(|v| v.as_str()).unwrap_or("");
    if matches!(access, "private" | "no") && !matches!(foot, "yes" | "designated" | "permissive") {
        return false;
    }

    foot != "no"
}

/// Attributes of one undirected edge, before CSR compilation.
#[derive(Debug, Clone)]
struct EdgeAttrs {
    weight: f64,
    name: String,
    highway: String,
}

/// Accumulates walkable ways into an undirected edge set and compiles
/// the result into a [CompactGraph].
///
/// Nodes are kept only when at least one surviving edge ends at them.
/// Parallel ways between the same pair of nodes are deduplicated by keeping
/// the strictly shortest one, attributes included. Self-loops are discarded.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    bbox: Option<BoundingBox>,
    nodes: BTreeMap<i64, (f32, f32)>,
    edges: HashMap<(i64, i64), EdgeAttrs>,
}

impl GraphBuilder {
    /// Creates a builder accepting nodes anywhere on Earth.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder discarding nodes outside the given bounding box.
    pub fn with_bbox(bbox: BoundingBox) -> Self {
        Self {
            bbox: Some(bbox),
            ..Self::default()
        }
    }

    /// Adds every edge of a single way, resolving node references through
    /// `coords`. Segments with an endpoint missing from `coords` (or outside
    /// the bounding box) are skipped. Non-walkable ways are ignored entirely.
    pub fn add_way(&mut self, way: &Way, coords: &HashMap<i64, (f64, f64)>) {
        if !way_is_walkable(&way.tags) {
            return;
        }

        let name = way.tags.get("name").map(|v| v.as_str()).unwrap_or("");
        let highway = match way.tags.get("highway") {
            Some(h) => h.as_str(),
            None => return,
        };

        for pair in way.node_refs.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a == b {
                continue;
            }
            let (Some(&(lat1, lon1)), Some(&(lat2, lon2))) = (coords.get(&a), coords.get(&b))
            else {
                continue;
            };
            if let Some(bbox) = self.bbox {
                if !bbox.contains(lat1, lon1) || !bbox.contains(lat2, lon2) {
                    continue;
                }
            }

            let weight = haversine(lat1, lon1, lat2, lon2);
            self.nodes.insert(a, (lat1 as f32, lon1 as f32));
            self.nodes.insert(b, (lat2 as f32, lon2 as f32));

            let key = (a.min(b), a.max(b));
            match self.edges.entry(key) {
                Entry::Vacant(e) => {
                    e.insert(EdgeAttrs {
                        weight,
                        name: name.to_string(),
                        highway: highway.to_string(),
                    });
                }
                Entry::Occupied(mut e) => {
                    // Parallel ways: keep the strictly shorter edge
                    if weight < e.get().weight {
                        *e.get_mut() = EdgeAttrs {
                            weight,
                            name: name.to_string(),
                            highway: highway.to_string(),
                        };
                    }
                }
            }
        }
    }

    /// Adds every way from an iterator. See [GraphBuilder::add_way].
    pub fn add_ways<'a, I: IntoIterator<Item = &'a Way>>(
        &mut self,
        ways: I,
        coords: &HashMap<i64, (f64, f64)>,
    ) {
        for way in ways {
            self.add_way(way, coords);
        }
    }

    /// Compiles the accumulated nodes and edges into a [CompactGraph].
    ///
    /// Nodes are indexed in ascending OSM-id order. String tables collect the
    /// distinct non-empty names and highway classes, sorted ascending, with
    /// the empty string pinned at index 0. Every undirected edge is written
    /// into both endpoints' CSR slices, which are then sorted by target index.
    pub fn build(self) -> CompactGraph {
        let num_nodes = self.nodes.len();

        let mut node_ids = Vec::with_capacity(num_nodes);
        let mut node_lats = Vec::with_capacity(num_nodes);
        let mut node_lons = Vec::with_capacity(num_nodes);
        let mut osm_to_idx: HashMap<i64, u32> = HashMap::with_capacity(num_nodes);
        for (i, (&osm_id, &(lat, lon))) in self.nodes.iter().enumerate() {
            node_ids.push(osm_id);
            node_lats.push(lat);
            node_lons.push(lon);
            osm_to_idx.insert(osm_id, i as u32);
        }

        let mut name_set: BTreeSet<&str> = BTreeSet::new();
        let mut highway_set: BTreeSet<&str> = BTreeSet::new();
        for attrs in self.edges.values() {
            if !attrs.name.is_empty() {
                name_set.insert(&attrs.name);
            }
            if !attrs.highway.is_empty() {
                highway_set.insert(&attrs.highway);
            }
        }
        let name_table: Vec<String> = std::iter::once("")
            .chain(name_set)
            .map(str::to_string)
            .collect();
        let highway_table: Vec<String> = std::iter::once("")
            .chain(highway_set)
            .map(str::to_string)
            .collect();
        let name_to_idx: HashMap<&str, u16> = name_table
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i as u16))
            .collect();
        let highway_to_idx: HashMap<&str, u8> = highway_table
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i as u8))
            .collect();

        // Each undirected edge contributes one slot to both endpoints
        let mut degrees = vec![0i32; num_nodes];
        for &(a, b) in self.edges.keys() {
            degrees[osm_to_idx[&a] as usize] += 1;
            degrees[osm_to_idx[&b] as usize] += 1;
        }

        let mut adj_offsets = vec![0i32; num_nodes + 1];
        for i in 0..num_nodes {
            adj_offsets[i + 1] = adj_offsets[i] + degrees[i];
        }
        let num_slots = adj_offsets[num_nodes] as usize;

        let mut adj_targets = vec![0i32; num_slots];
        let mut adj_weights = vec![0f32; num_slots];
        let mut edge_name_indices = vec![0u16; num_slots];
        let mut edge_highway_indices = vec![0u8; num_slots];

        let mut cursor: Vec<i32> = adj_offsets[..num_nodes].to_vec();
        for (&(a, b), attrs) in &self.edges {
            let a_idx = osm_to_idx[&a];
            let b_idx = osm_to_idx[&b];
            let weight = attrs.weight as f32;
            let name_idx = name_to_idx[attrs.name.as_str()];
            let highway_idx = highway_to_idx[attrs.highway.as_str()];

            for (from, to) in [(a_idx, b_idx), (b_idx, a_idx)] {
                let at = cursor[from as usize] as usize;
                adj_targets[at] = to as i32;
                adj_weights[at] = weight;
                edge_name_indices[at] = name_idx;
                edge_highway_indices[at] = highway_idx;
                cursor[from as usize] += 1;
            }
        }

        // Sort each neighbor slice by target index, carrying all parallel arrays
        for i in 0..num_nodes {
            let start = adj_offsets[i] as usize;
            let end = adj_offsets[i + 1] as usize;
            if end - start < 2 {
                continue;
            }
            let mut slice: Vec<(i32, f32, u16, u8)> = (start..end)
                .map(|j| {
                    (
                        adj_targets[j],
                        adj_weights[j],
                        edge_name_indices[j],
                        edge_highway_indices[j],
                    )
                })
                .collect();
            slice.sort_unstable_by_key(|&(target, ..)| target);
            for (j, (target, weight, name_idx, highway_idx)) in slice.into_iter().enumerate() {
                adj_targets[start + j] = target;
                adj_weights[start + j] = weight;
                edge_name_indices[start + j] = name_idx;
                edge_highway_indices[start + j] = highway_idx;
            }
        }

        info!(
            "compiled graph: {} nodes, {} undirected edges, {} names, {} highway classes",
            num_nodes,
            num_slots / 2,
            name_table.len() - 1,
            highway_table.len() - 1,
        );

        CompactGraph::from_parts(
            node_ids,
            node_lats,
            node_lons,
            adj_offsets,
            adj_targets,
            adj_weights,
            Some(edge_name_indices),
            Some(edge_highway_indices),
            Some(name_table),
            Some(highway_table),
        )
    }
}
