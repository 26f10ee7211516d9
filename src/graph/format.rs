// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! On-disk format for [CompactGraph]: a 32-byte header followed by the CSR
//! arrays and string tables, all little-endian and tightly packed.
//!
//! ```text
//! Header:
//!   magic              "CSRG"        (4 bytes ASCII)
//!   version            u32           (1 or 2)
//!   num_nodes          u32
//!   num_directed_edges u32
//!   reserved           16 zero bytes
//! Payload:
//!   node_ids             i64 × num_nodes
//!   node_lats            f32 × num_nodes
//!   node_lons            f32 × num_nodes
//!   adj_offsets          i32 × (num_nodes + 1)
//!   adj_targets          i32 × num_directed_edges
//!   adj_weights          f32 × num_directed_edges
//!   edge_name_indices    u16 × num_directed_edges   (v2 only)
//!   edge_highway_indices u8  × num_directed_edges   (v2 only)
//!   name_table           u32 count, per entry u16 length + UTF-8 bytes (v2 only)
//!   highway_table        same shape                 (v2 only)
//! ```
//!
//! Version 1 files omit the metadata sections; they load with all metadata
//! lookups returning `None`. The same layout serves as the build cache and
//! as the export consumed by downstream native readers.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;

use super::{BoundingBox, CompactGraph, GraphBuilder, Way};

const MAGIC: [u8; 4] = *b"CSRG";
const RESERVED_LEN: usize = 16;

/// Error conditions which may occur when reading or writing the graph format.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("bad magic {0:?}, expected \"CSRG\"")]
    BadMagic([u8; 4]),

    #[error("unsupported format version: {0} (supported: 1 and 2)")]
    UnsupportedVersion(u32),

    #[error("string table entry is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed graph: {0}")]
    InvariantViolation(&'static str),
}

/// Serializes a graph to the given path, creating parent directories
/// as needed. Graphs without name metadata are written as version 1.
pub fn save_graph<P: AsRef<Path>>(graph: &CompactGraph, path: P) -> Result<(), FormatError> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    write_graph(graph, &mut w)?;
    w.flush()?;
    Ok(())
}

/// Deserializes a graph from the given path, verifying its structural
/// invariants. Accepts both format versions.
pub fn load_graph<P: AsRef<Path>>(path: P) -> Result<CompactGraph, FormatError> {
    let mut r = BufReader::new(File::open(path)?);
    let graph = read_graph(&mut r)?;
    graph.validate()?;
    Ok(graph)
}

/// Loads a cached graph from `path` if it exists; otherwise compiles one
/// from the provided ways and coordinates, persists it to `path`, and
/// returns it.
pub fn build_or_load<P: AsRef<Path>>(
    path: P,
    ways: &[Way],
    coords: &HashMap<i64, (f64, f64)>,
    bbox: Option<BoundingBox>,
) -> Result<CompactGraph, FormatError> {
    let path = path.as_ref();
    if path.exists() {
        info!("loading cached graph from {}", path.display());
        let graph = load_graph(path)?;
        info!(
            "loaded {} nodes, {} undirected edges",
            graph.num_nodes(),
            graph.num_edges()
        );
        return Ok(graph);
    }

    let mut builder = match bbox {
        Some(bbox) => GraphBuilder::with_bbox(bbox),
        None => GraphBuilder::new(),
    };
    builder.add_ways(ways, coords);
    let graph = builder.build();
    save_graph(&graph, path)?;
    info!("cached graph to {}", path.display());
    Ok(graph)
}

fn write_graph<W: Write>(graph: &CompactGraph, w: &mut W) -> Result<(), FormatError> {
    let version: u32 = if graph.has_name_data() { 2 } else { 1 };

    w.write_all(&MAGIC)?;
    w.write_all(&version.to_le_bytes())?;
    w.write_all(&(graph.node_ids.len() as u32).to_le_bytes())?;
    w.write_all(&(graph.adj_targets.len() as u32).to_le_bytes())?;
    w.write_all(&[0u8; RESERVED_LEN])?;

    for &id in &graph.node_ids {
        w.write_all(&id.to_le_bytes())?;
    }
    for &lat in &graph.node_lats {
        w.write_all(&lat.to_le_bytes())?;
    }
    for &lon in &graph.node_lons {
        w.write_all(&lon.to_le_bytes())?;
    }
    for &offset in &graph.adj_offsets {
        w.write_all(&offset.to_le_bytes())?;
    }
    for &target in &graph.adj_targets {
        w.write_all(&target.to_le_bytes())?;
    }
    for &weight in &graph.adj_weights {
        w.write_all(&weight.to_le_bytes())?;
    }

    if version >= 2 {
        // has_name_data guarantees all four metadata fields are present
        if let (Some(name_indices), Some(highway_indices), Some(names), Some(highways)) = (
            &graph.edge_name_indices,
            &graph.edge_highway_indices,
            &graph.name_table,
            &graph.highway_table,
        ) {
            for &idx in name_indices {
                w.write_all(&idx.to_le_bytes())?;
            }
            w.write_all(highway_indices)?;
            write_string_table(w, names)?;
            write_string_table(w, highways)?;
        }
    }

    Ok(())
}

fn write_string_table<W: Write>(w: &mut W, table: &[String]) -> Result<(), FormatError> {
    w.write_all(&(table.len() as u32).to_le_bytes())?;
    for entry in table {
        w.write_all(&(entry.len() as u16).to_le_bytes())?;
        w.write_all(entry.as_bytes())?;
    }
    Ok(())
}

fn read_graph<R: Read>(r: &mut R) -> Result<CompactGraph, FormatError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(FormatError::BadMagic(magic));
    }

    let version = read_u32(r)?;
    if version != 1 && version != 2 {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let num_nodes = read_u32(r)? as usize;
    let num_slots = read_u32(r)? as usize;
    let mut reserved = [0u8; RESERVED_LEN];
    r.read_exact(&mut reserved)?;

    let node_ids = read_vec(r, num_nodes, |b: [u8; 8]| i64::from_le_bytes(b))?;
    let node_lats = read_vec(r, num_nodes, |b: [u8; 4]| f32::from_le_bytes(b))?;
    let node_lons = read_vec(r, num_nodes, |b: [u8; 4]| f32::from_le_bytes(b))?;
    let adj_offsets = read_vec(r, num_nodes + 1, |b: [u8; 4]| i32::from_le_bytes(b))?;
    let adj_targets = read_vec(r, num_slots, |b: [u8; 4]| i32::from_le_bytes(b))?;
    let adj_weights = read_vec(r, num_slots, |b: [u8; 4]| f32::from_le_bytes(b))?;

    let (edge_name_indices, edge_highway_indices, name_table, highway_table) = if version >= 2 {
        let name_indices = read_vec(r, num_slots, |b: [u8; 2]| u16::from_le_bytes(b))?;
        let mut highway_indices = vec![0u8; num_slots];
        r.read_exact(&mut highway_indices)?;
        let names = read_string_table(r)?;
        let highways = read_string_table(r)?;
        (
            Some(name_indices),
            Some(highway_indices),
            Some(names),
            Some(highways),
        )
    } else {
        (None, None, None, None)
    };

    Ok(CompactGraph::from_parts(
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
    ))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, FormatError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_vec<R: Read, T, const W: usize>(
    r: &mut R,
    count: usize,
    decode: impl Fn([u8; W]) -> T,
) -> Result<Vec<T>, FormatError> {
    let mut out = Vec::with_capacity(count);
    let mut buf = [0u8; W];
    for _ in 0..count {
        r.read_exact(&mut buf)?;
        out.push(decode(buf));
    }
    Ok(out)
}

fn read_string_table<R: Read>(r: &mut R) -> Result<Vec<String>, FormatError> {
    let count = read_u32(r)? as usize;
    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
        let mut len_buf = [0u8; 2];
        r.read_exact(&mut len_buf)?;
        let mut bytes = vec![0u8; u16::from_le_bytes(len_buf) as usize];
        r.read_exact(&mut bytes)?;
        table.push(String::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8)?);
    }
    Ok(table)
}

impl CompactGraph {
    /// Checks the structural invariants of the CSR representation:
    /// strictly ascending node ids, monotonic offsets, sorted self-loop-free
    /// neighbor slices, reciprocal directed slots with identical attributes,
    /// and in-range metadata indices.
    pub(crate) fn validate(&self) -> Result<(), FormatError> {
        let n = self.node_ids.len();
        let violation = |what| Err(FormatError::InvariantViolation(what));

        if self.node_lats.len() != n || self.node_lons.len() != n {
            return violation("coordinate array length mismatch");
        }
        if self.node_ids.windows(2).any(|w| w[0] >= w[1]) {
            return violation("node ids not strictly ascending");
        }

        if self.adj_offsets.len() != n + 1 {
            return violation("offset array length mismatch");
        }
        if self.adj_offsets.first() != Some(&0)
            || self.adj_offsets.last() != Some(&(self.adj_targets.len() as i32))
        {
            return violation("offset array does not span the adjacency");
        }
        if self.adj_offsets.windows(2).any(|w| w[0] > w[1]) {
            return violation("offsets not monotonic");
        }
        if self.adj_weights.len() != self.adj_targets.len() {
            return violation("weight array length mismatch");
        }
        if self.adj_targets.len() % 2 != 0 {
            return violation("odd number of directed slots");
        }

        if let (Some(name_indices), Some(names)) = (&self.edge_name_indices, &self.name_table) {
            if name_indices.len() != self.adj_targets.len() {
                return violation("name index array length mismatch");
            }
            if name_indices.iter().any(|&i| i as usize >= names.len()) {
                return violation("name index out of table range");
            }
            if names.first().map(String::as_str) != Some("") {
                return violation("name table does not start with the empty string");
            }
        }
        if let (Some(highway_indices), Some(highways)) =
            (&self.edge_highway_indices, &self.highway_table)
        {
            if highway_indices.len() != self.adj_targets.len() {
                return violation("highway index array length mismatch");
            }
            if highway_indices.iter().any(|&i| i as usize >= highways.len()) {
                return violation("highway index out of table range");
            }
            if highways.first().map(String::as_str) != Some("") {
                return violation("highway table does not start with the empty string");
            }
        }

        for i in 0..n as u32 {
            let (targets, weights) = self.neighbors(i);
            if targets.windows(2).any(|w| w[0] >= w[1]) {
                return violation("neighbor slice not strictly ascending");
            }
            for (&target, &weight) in targets.iter().zip(weights) {
                if target < 0 || target as usize >= n {
                    return violation("neighbor target out of range");
                }
                if target == i as i32 {
                    return violation("self-loop");
                }
                let reciprocal = self.edge_slot(target as u32, i);
                match reciprocal {
                    Some(j) if self.adj_weights[j] == weight => {}
                    _ => return violation("missing or mismatched reciprocal slot"),
                }
                if let (Some(name_indices), Some(highway_indices)) =
                    (&self.edge_name_indices, &self.edge_highway_indices)
                {
                    let here = self.edge_slot(i, target as u32);
                    if let (Some(here), Some(there)) = (here, reciprocal) {
                        if name_indices[here] != name_indices[there]
                            || highway_indices[here] != highway_indices[there]
                        {
                            return violation("reciprocal slots disagree on metadata");
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::shortest_path;
    use crate::testutil::{tags, y_graph};

    fn round_trip(graph: &CompactGraph) -> CompactGraph {
        let mut bytes = Vec::new();
        write_graph(graph, &mut bytes).unwrap();
        let loaded = read_graph(&mut bytes.as_slice()).unwrap();
        loaded.validate().unwrap();
        loaded
    }

    #[test]
    fn y_shape_round_trip() {
        let graph = y_graph();
        let loaded = round_trip(&graph);

        assert_eq!(loaded.node_ids, graph.node_ids);
        assert_eq!(loaded.node_lats, graph.node_lats);
        assert_eq!(loaded.node_lons, graph.node_lons);
        assert_eq!(loaded.adj_offsets, graph.adj_offsets);
        assert_eq!(loaded.adj_targets, graph.adj_targets);
        assert_eq!(loaded.adj_weights, graph.adj_weights);
        assert_eq!(loaded.edge_name_indices, graph.edge_name_indices);
        assert_eq!(loaded.edge_highway_indices, graph.edge_highway_indices);
        assert_eq!(loaded.name_table, graph.name_table);
        assert_eq!(loaded.highway_table, graph.highway_table);

        // Identical routes for every source/target pair
        for &src in &graph.node_ids {
            for &tgt in &graph.node_ids {
                let (path_a, dist_a) = shortest_path(&graph, src, tgt).unwrap();
                let (path_b, dist_b) = shortest_path(&loaded, src, tgt).unwrap();
                assert_eq!(path_a, path_b);
                assert_eq!(dist_a, dist_b);
            }
        }
    }

    #[test]
    fn v1_graph_loads_without_metadata() {
        let graph = y_graph();
        let stripped = CompactGraph::from_parts(
            graph.node_ids.clone(),
            graph.node_lats.clone(),
            graph.node_lons.clone(),
            graph.adj_offsets.clone(),
            graph.adj_targets.clone(),
            graph.adj_weights.clone(),
            None,
            None,
            None,
            None,
        );

        let mut bytes = Vec::new();
        write_graph(&stripped, &mut bytes).unwrap();
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);

        let loaded = read_graph(&mut bytes.as_slice()).unwrap();
        loaded.validate().unwrap();
        assert!(!loaded.has_name_data());
        assert_eq!(loaded.edge_name(0, 1), None);
        assert_eq!(loaded.num_edges(), graph.num_edges());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Vec::new();
        write_graph(&y_graph(), &mut bytes).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            read_graph(&mut bytes.as_slice()),
            Err(FormatError::BadMagic(_))
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = Vec::new();
        write_graph(&y_graph(), &mut bytes).unwrap();
        bytes[4..8].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            read_graph(&mut bytes.as_slice()),
            Err(FormatError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut bytes = Vec::new();
        write_graph(&y_graph(), &mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(matches!(
            read_graph(&mut bytes.as_slice()),
            Err(FormatError::Io(_))
        ));
    }

    #[test]
    fn validate_catches_unsorted_node_ids() {
        let graph = y_graph();
        let mut node_ids = graph.node_ids.clone();
        node_ids.swap(0, 1);
        let broken = CompactGraph::from_parts(
            node_ids,
            graph.node_lats.clone(),
            graph.node_lons.clone(),
            graph.adj_offsets.clone(),
            graph.adj_targets.clone(),
            graph.adj_weights.clone(),
            None,
            None,
            None,
            None,
        );
        assert!(matches!(
            broken.validate(),
            Err(FormatError::InvariantViolation(_))
        ));
    }

    #[test]
    fn build_or_load_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk_graph.bin");

        let coords: HashMap<i64, (f64, f64)> = [(1, (0.0, 0.0)), (2, (0.0, 0.001))].into_iter().collect();
        let ways = vec![Way {
            tags: tags(&[("highway", "footway")]),
            node_refs: vec![1, 2],
        }];

        let built = build_or_load(&path, &ways, &coords, None).unwrap();
        assert!(path.exists());
        assert_eq!(built.num_edges(), 1);

        // Second call must read the cache, ways are ignored
        let cached = build_or_load(&path, &[], &coords, None).unwrap();
        assert_eq!(cached.num_nodes(), built.num_nodes());
        assert_eq!(cached.num_edges(), built.num_edges());
    }
}
