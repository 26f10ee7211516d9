// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use log::debug;
use rusqlite::Connection;
use serde::Serialize;

/// Returns the canonical key of an undirected edge: the smaller OSM node id
/// first. All walk-history storage and lookup goes through this key, so
/// recording a traversal of `(b, a)` and querying `(a, b)` hit the same row.
pub fn edge_key(a: i64, b: i64) -> (i64, i64) {
    (a.min(b), a.max(b))
}

/// Error conditions reported by [WalkHistory].
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history store: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Summary statistics over the whole walk history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub unique_edges_walked: u64,
    pub total_edge_traversals: u64,
    pub avg_walks_per_edge: f64,
    pub max_walks_single_edge: u64,
    pub first_walk: Option<String>,
    pub last_walk: Option<String>,
}

/// A durable record of which undirected edges have been walked, how many
/// times, and when last.
///
/// Backed by an SQLite database with one row per canonical edge key.
/// [record_walk](WalkHistory::record_walk) commits all of its edges in a
/// single transaction; readers observe either none or all of a call's
/// increments.
pub struct WalkHistory {
    conn: Connection,
}

impl WalkHistory {
    /// Opens (or creates) the history database at the given path,
    /// creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HistoryError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a transient in-memory history, lost on drop.
    pub fn open_in_memory() -> Result<Self, HistoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS edge_history (
                 edge_start  INTEGER NOT NULL,
                 edge_end    INTEGER NOT NULL,
                 walk_count  INTEGER NOT NULL DEFAULT 1,
                 last_walked TEXT NOT NULL,
                 PRIMARY KEY (edge_start, edge_end)
             );",
        )?;
        Ok(Self { conn })
    }

    /// Records a list of edges as walked, incrementing each edge's count and
    /// stamping it with the current UTC time. One transaction per call.
    pub fn record_walk(&mut self, edges: &[(i64, i64)]) -> Result<(), HistoryError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO edge_history (edge_start, edge_end, walk_count, last_walked) \
                 VALUES (?1, ?2, 1, ?3) \
                 ON CONFLICT (edge_start, edge_end) \
                 DO UPDATE SET walk_count = walk_count + 1, last_walked = ?3",
            )?;
            for &(a, b) in edges {
                let (start, end) = edge_key(a, b);
                stmt.execute(rusqlite::params![start, end, now])?;
            }
        }
        tx.commit()?;
        debug!("recorded {} edge traversals", edges.len());
        Ok(())
    }

    /// Returns the set of all walked edge keys.
    pub fn walked_edges(&self) -> Result<HashSet<(i64, i64)>, HistoryError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT edge_start, edge_end FROM edge_history")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut edges = HashSet::new();
        for row in rows {
            edges.insert(row?);
        }
        Ok(edges)
    }

    /// Checks whether a specific edge has been walked, in either direction.
    pub fn is_walked(&self, a: i64, b: i64) -> Result<bool, HistoryError> {
        Ok(self.walk_count(a, b)? > 0)
    }

    /// Returns how many times an edge has been walked, 0 if never.
    pub fn walk_count(&self, a: i64, b: i64) -> Result<u64, HistoryError> {
        let (start, end) = edge_key(a, b);
        let mut stmt = self.conn.prepare_cached(
            "SELECT walk_count FROM edge_history WHERE edge_start = ?1 AND edge_end = ?2",
        )?;
        let mut rows = stmt.query(rusqlite::params![start, end])?;
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    /// Returns summary statistics over the whole history.
    pub fn stats(&self) -> Result<HistoryStats, HistoryError> {
        self.conn
            .query_row(
                "SELECT COUNT(*), SUM(walk_count), AVG(walk_count), MAX(walk_count), \
                        MIN(last_walked), MAX(last_walked) \
                 FROM edge_history",
                [],
                |row| {
                    let avg: Option<f64> = row.get(2)?;
                    Ok(HistoryStats {
                        unique_edges_walked: row.get(0)?,
                        total_edge_traversals: row.get::<_, Option<u64>>(1)?.unwrap_or(0),
                        avg_walks_per_edge: avg.map(|a| (a * 100.0).round() / 100.0).unwrap_or(0.0),
                        max_walks_single_edge: row.get::<_, Option<u64>>(3)?.unwrap_or(0),
                        first_walk: row.get(4)?,
                        last_walk: row.get(5)?,
                    })
                },
            )
            .map_err(HistoryError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_is_direction_independent() {
        let mut history = WalkHistory::open_in_memory().unwrap();
        history.record_walk(&[(5, 3)]).unwrap();

        assert!(history.is_walked(3, 5).unwrap());
        assert!(history.is_walked(5, 3).unwrap());
        assert_eq!(history.walk_count(3, 5).unwrap(), 1);
    }

    #[test]
    fn repeated_walks_increment_by_one_each() {
        let mut history = WalkHistory::open_in_memory().unwrap();
        let edges = [(1, 2), (2, 3)];

        history.record_walk(&edges).unwrap();
        history.record_walk(&edges).unwrap();

        assert_eq!(history.walk_count(1, 2).unwrap(), 2);
        assert_eq!(history.walk_count(3, 2).unwrap(), 2);
        assert_eq!(history.walk_count(1, 3).unwrap(), 0);
    }

    #[test]
    fn walked_edges_returns_canonical_keys() {
        let mut history = WalkHistory::open_in_memory().unwrap();
        history.record_walk(&[(7, 4), (4, 7), (1, 9)]).unwrap();

        let walked = history.walked_edges().unwrap();
        assert_eq!(walked.len(), 2);
        assert!(walked.contains(&(4, 7)));
        assert!(walked.contains(&(1, 9)));
    }

    #[test]
    fn stats_on_empty_history() {
        let history = WalkHistory::open_in_memory().unwrap();
        let stats = history.stats().unwrap();
        assert_eq!(stats.unique_edges_walked, 0);
        assert_eq!(stats.total_edge_traversals, 0);
        assert_eq!(stats.avg_walks_per_edge, 0.0);
        assert_eq!(stats.max_walks_single_edge, 0);
        assert_eq!(stats.first_walk, None);
        assert_eq!(stats.last_walk, None);
    }

    #[test]
    fn stats_aggregates() {
        let mut history = WalkHistory::open_in_memory().unwrap();
        history.record_walk(&[(1, 2), (2, 3)]).unwrap();
        history.record_walk(&[(1, 2)]).unwrap();

        let stats = history.stats().unwrap();
        assert_eq!(stats.unique_edges_walked, 2);
        assert_eq!(stats.total_edge_traversals, 3);
        assert_eq!(stats.avg_walks_per_edge, 1.5);
        assert_eq!(stats.max_walks_single_edge, 2);
        assert!(stats.first_walk.is_some());
        assert_eq!(stats.first_walk, stats.last_walk);
    }

    #[test]
    fn timestamps_are_utc_rfc3339() {
        let mut history = WalkHistory::open_in_memory().unwrap();
        history.record_walk(&[(1, 2)]).unwrap();
        let stats = history.stats().unwrap();
        let stamp = stats.last_walk.unwrap();
        assert!(stamp.ends_with("+00:00"), "got {}", stamp);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk_history.db");

        {
            let mut history = WalkHistory::open(&path).unwrap();
            history.record_walk(&[(1, 2)]).unwrap();
        }

        let history = WalkHistory::open(&path).unwrap();
        assert_eq!(history.walk_count(2, 1).unwrap(), 1);
    }
}
