// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::geo::{haversine, EARTH_RADIUS};
use crate::kd::{KDTree, PlanePoint};

mod builder;
mod format;

pub use builder::{BoundingBox, GraphBuilder, Way};
pub use format::{build_or_load, load_graph, save_graph, FormatError};

/// How many euclidean candidates the snap index retrieves before
/// re-ranking them with [haversine]. The tangent-plane projection is
/// not distance-exact; re-ranking a handful of candidates removes its
/// residual error at metropolitan extents.
const SNAP_CANDIDATES: usize = 10;

/// Error conditions reported by [CompactGraph] lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// An OSM node id is not present in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(i64),

    /// A nearest-node query was made against an empty graph, or with
    /// non-finite coordinates.
    #[error("invalid coordinate query")]
    InvalidCoord,
}

/// An immutable walkable street network in
/// [CSR](https://en.wikipedia.org/wiki/Sparse_matrix#Compressed_sparse_row_(CSR,_CRS_or_Yale_format))
/// adjacency form.
///
/// Nodes are identified by their dense index in `[0, N)`, assigned by sorting
/// nodes on ascending OSM id; `node_id` maps back to the stable OSM id. Each
/// undirected edge occupies two directed slots, one per endpoint, with
/// identical weight and metadata. Within a node's neighbor slice the targets
/// are strictly ascending.
///
/// Name and highway-class metadata is optional: graphs serialized by older
/// versions of the on-disk format carry none, and all metadata lookups then
/// return `None`.
#[derive(Debug)]
pub struct CompactGraph {
    pub(super) node_ids: Vec<i64>,
    pub(super) node_lats: Vec<f32>,
    pub(super) node_lons: Vec<f32>,
    pub(super) adj_offsets: Vec<i32>,
    pub(super) adj_targets: Vec<i32>,
    pub(super) adj_weights: Vec<f32>,
    pub(super) edge_name_indices: Option<Vec<u16>>,
    pub(super) edge_highway_indices: Option<Vec<u8>>,
    pub(super) name_table: Option<Vec<String>>,
    pub(super) highway_table: Option<Vec<String>>,

    id_to_idx: HashMap<i64, u32>,
    snap_index: OnceLock<SnapIndex>,
}

/// Lazily-built nearest-node index: a k-d tree over tangent-plane
/// projections of all node coordinates.
#[derive(Debug)]
struct SnapIndex {
    tree: Option<KDTree>,
    cos_mean_lat: f64,
}

impl CompactGraph {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn from_parts(
        node_ids: Vec<i64>,
        node_lats: Vec<f32>,
        node_lons: Vec<f32>,
        adj_offsets: Vec<i32>,
        adj_targets: Vec<i32>,
        adj_weights: Vec<f32>,
        edge_name_indices: Option<Vec<u16>>,
        edge_highway_indices: Option<Vec<u8>>,
        name_table: Option<Vec<String>>,
        highway_table: Option<Vec<String>>,
    ) -> Self {
        let id_to_idx = node_ids
            .iter()
            .enumerate()
            .map(|(i, &osm_id)| (osm_id, i as u32))
            .collect();

        Self {
            node_ids,
            node_lats,
            node_lons,
            adj_offsets,
            adj_targets,
            adj_weights,
            edge_name_indices,
            edge_highway_indices,
            name_table,
            highway_table,
            id_to_idx,
            snap_index: OnceLock::new(),
        }
    }

    /// Returns the number of nodes in the graph.
    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    /// Returns the number of undirected edges in the graph.
    /// Each undirected edge occupies two directed CSR slots.
    pub fn num_edges(&self) -> usize {
        self.adj_targets.len() / 2
    }

    /// Returns the OSM id of the node at the given dense index.
    pub fn node_id(&self, idx: u32) -> i64 {
        self.node_ids[idx as usize]
    }

    /// Returns the `(lat, lon)` position of the node at the given dense index.
    pub fn node_coords(&self, idx: u32) -> (f64, f64) {
        (
            self.node_lats[idx as usize] as f64,
            self.node_lons[idx as usize] as f64,
        )
    }

    /// Resolves an OSM node id to its dense index.
    pub fn idx_for_osm_id(&self, osm_id: i64) -> Result<u32, GraphError> {
        self.id_to_idx
            .get(&osm_id)
            .copied()
            .ok_or(GraphError::UnknownNode(osm_id))
    }

    /// Returns the neighbor targets and edge weights of the node at `idx`,
    /// as zero-copy borrowed slices of the CSR backing arrays.
    pub fn neighbors(&self, idx: u32) -> (&[i32], &[f32]) {
        let start = self.adj_offsets[idx as usize] as usize;
        let end = self.adj_offsets[idx as usize + 1] as usize;
        (&self.adj_targets[start..end], &self.adj_weights[start..end])
    }

    /// Finds the directed CSR slot for the edge `u_idx → v_idx`.
    /// Neighbor slices are sorted by target, allowing a binary search.
    fn edge_slot(&self, u_idx: u32, v_idx: u32) -> Option<usize> {
        let start = self.adj_offsets[u_idx as usize] as usize;
        let end = self.adj_offsets[u_idx as usize + 1] as usize;
        self.adj_targets[start..end]
            .binary_search(&(v_idx as i32))
            .ok()
            .map(|at| start + at)
    }

    /// Returns the weight of the edge `u_idx → v_idx`, in meters,
    /// or `None` if no such edge exists.
    pub fn edge_weight(&self, u_idx: u32, v_idx: u32) -> Option<f32> {
        self.edge_slot(u_idx, v_idx).map(|j| self.adj_weights[j])
    }

    /// Returns the street name of the edge `u_idx → v_idx`. `None` when the
    /// edge is unnamed, when no such edge exists, or when the graph carries
    /// no name metadata.
    pub fn edge_name(&self, u_idx: u32, v_idx: u32) -> Option<&str> {
        let indices = self.edge_name_indices.as_ref()?;
        let table = self.name_table.as_ref()?;
        let name = table.get(indices[self.edge_slot(u_idx, v_idx)?] as usize)?;
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Returns the highway class of the edge `u_idx → v_idx`. `None` when
    /// unknown, when no such edge exists, or when the graph carries no
    /// highway metadata.
    pub fn edge_highway(&self, u_idx: u32, v_idx: u32) -> Option<&str> {
        let indices = self.edge_highway_indices.as_ref()?;
        let table = self.highway_table.as_ref()?;
        let highway = table.get(indices[self.edge_slot(u_idx, v_idx)?] as usize)?;
        if highway.is_empty() {
            None
        } else {
            Some(highway)
        }
    }

    /// Returns true if the graph carries street-name metadata
    /// (graphs serialized by older format versions do not).
    pub fn has_name_data(&self) -> bool {
        self.edge_name_indices.is_some() && self.name_table.is_some()
    }

    /// Finds the graph node closest to the given position, along with its
    /// haversine distance in meters.
    ///
    /// The underlying k-d tree is built lazily on the first query. Candidates
    /// are retrieved under the euclidean metric on a local tangent plane and
    /// re-ranked with the true spherical distance.
    pub fn find_nearest_node(&self, lat: f64, lon: f64) -> Result<(u32, f64), GraphError> {
        if self.node_ids.is_empty() || !lat.is_finite() || !lon.is_finite() {
            return Err(GraphError::InvalidCoord);
        }

        let snap = self.snap_index.get_or_init(|| self.build_snap_index());
        let tree = snap.tree.as_ref().ok_or(GraphError::InvalidCoord)?;

        let qx = lat.to_radians() * EARTH_RADIUS;
        let qy = lon.to_radians() * EARTH_RADIUS * snap.cos_mean_lat;
        let k = SNAP_CANDIDATES.min(self.node_ids.len());

        let mut best: Option<(u32, f64)> = None;
        for idx in tree.nearest(qx, qy, k) {
            let (nd_lat, nd_lon) = self.node_coords(idx);
            let d = haversine(lat, lon, nd_lat, nd_lon);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((idx, d));
            }
        }
        best.ok_or(GraphError::InvalidCoord)
    }

    fn build_snap_index(&self) -> SnapIndex {
        let mean_lat =
            self.node_lats.iter().map(|&lat| lat as f64).sum::<f64>() / self.node_lats.len() as f64;
        let cos_mean_lat = mean_lat.to_radians().cos();

        let mut points: Vec<PlanePoint> = self
            .node_lats
            .iter()
            .zip(self.node_lons.iter())
            .enumerate()
            .map(|(i, (&lat, &lon))| PlanePoint {
                x: (lat as f64).to_radians() * EARTH_RADIUS,
                y: (lon as f64).to_radians() * EARTH_RADIUS * cos_mean_lat,
                idx: i as u32,
            })
            .collect();

        SnapIndex {
            tree: KDTree::build(&mut points),
            cos_mean_lat,
        }
    }
}
