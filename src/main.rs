use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("invalid lat,lon value {0:?} (expected e.g. 37.7955,-122.3937)")]
struct LatLonParseError(String);

#[derive(Parser)]
#[command(about = "Novelty-weighted pedestrian router")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// The path to the walk-history database
    #[arg(long, default_value = "data/walk_history.db")]
    history: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Find a novelty-weighted walking route between two points
    Route {
        /// The path to the compact graph file
        #[arg(long, default_value = "data/walk_graph.bin")]
        graph: PathBuf,

        /// Start point as 'lat,lon'
        #[arg(long = "from")]
        from: String,

        /// End point as 'lat,lon'
        #[arg(long)]
        to: String,

        /// Minimum novelty fraction (0.0-1.0)
        #[arg(long, default_value_t = 0.3)]
        min_novelty: f64,

        /// Maximum overhead vs the shortest path (0.0-1.0)
        #[arg(long, default_value_t = 0.25)]
        max_overhead: f64,

        /// Record the route as walked
        #[arg(long)]
        record: bool,

        /// Save the route to a JSON file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a previously saved route as walked
    Record {
        /// A route JSON file written by the route subcommand
        route_file: PathBuf,
    },

    /// Show walk history statistics
    Stats,
}

#[derive(Serialize)]
struct Coordinate {
    lat: f64,
    lon: f64,
    node_id: i64,
}

/// The route payload written to JSON output.
#[derive(Serialize)]
struct RoutePayload {
    distance_m: f64,
    shortest_distance_m: f64,
    overhead_pct: f64,
    novelty_pct: f64,
    num_edges: usize,
    coordinates: Vec<Coordinate>,
    edges: Vec<(i64, i64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<Vec<wander::Instruction>>,
}

/// The subset of the payload needed to re-record a saved route.
#[derive(Deserialize)]
struct SavedRoute {
    edges: Vec<(i64, i64)>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn parse_latlon(s: &str) -> Result<(f64, f64), LatLonParseError> {
    let bad = || LatLonParseError(s.to_string());
    let (lat, lon) = s.split_once(',').ok_or_else(bad)?;
    Ok((
        lat.trim().parse().map_err(|_| bad())?,
        lon.trim().parse().map_err(|_| bad())?,
    ))
}

pub fn main() -> Result<(), Box<dyn Error>> {
    colog::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Route {
            graph,
            from,
            to,
            min_novelty,
            max_overhead,
            record,
            output,
        } => route(
            &cli.history,
            &graph,
            &from,
            &to,
            min_novelty,
            max_overhead,
            record,
            output.as_deref(),
        ),
        Command::Record { route_file } => record(&cli.history, &route_file),
        Command::Stats => stats(&cli.history),
    }
}

#[allow(clippy::too_many_arguments)]
fn route(
    history_path: &std::path::Path,
    graph_path: &std::path::Path,
    from: &str,
    to: &str,
    min_novelty: f64,
    max_overhead: f64,
    record: bool,
    output: Option<&std::path::Path>,
) -> Result<(), Box<dyn Error>> {
    let (start_lat, start_lon) = parse_latlon(from)?;
    let (end_lat, end_lon) = parse_latlon(to)?;

    let graph = wander::load_graph(graph_path)?;
    info!(
        "graph: {} nodes, {} edges",
        graph.num_nodes(),
        graph.num_edges()
    );

    let (src_idx, src_snap) = graph.find_nearest_node(start_lat, start_lon)?;
    let (tgt_idx, tgt_snap) = graph.find_nearest_node(end_lat, end_lon)?;
    let src = graph.node_id(src_idx);
    let tgt = graph.node_id(tgt_idx);
    info!("start: node {} ({:.0}m from input)", src, src_snap);
    info!("end:   node {} ({:.0}m from input)", tgt, tgt_snap);

    let mut history = wander::WalkHistory::open(history_path)?;
    let walked = history.walked_edges()?;
    info!("walk history: {} edges previously walked", walked.len());

    info!(
        "routing (min_novelty={}, max_overhead={})",
        min_novelty, max_overhead
    );
    let result = wander::novelty_route(
        &graph,
        src,
        tgt,
        &walked,
        wander::NoveltyParams {
            min_novelty,
            max_overhead,
        },
    )?;

    info!(
        "route found: {:.0}m ({:.2}km), shortest {:.0}m, overhead {:.1}%, novelty {:.1}%, {} edges",
        result.distance,
        result.distance / 1000.0,
        result.shortest_distance,
        result.overhead * 100.0,
        result.novelty * 100.0,
        result.edges.len(),
    );
    // Walking time estimate at 5 km/h
    info!(
        "est. time: {:.0} min",
        result.distance / 1000.0 / 5.0 * 60.0
    );

    if let Some(instructions) = &result.instructions {
        for (i, step) in instructions.iter().enumerate() {
            if step.turn_direction == wander::TurnDirection::Arrive {
                info!("{}. {}", i + 1, step.instruction);
            } else {
                info!("{}. {}  ({:.0}m)", i + 1, step.instruction, step.distance);
            }
        }
    }

    let coordinates = result
        .path
        .iter()
        .map(|&node_id| {
            let idx = graph.idx_for_osm_id(node_id)?;
            let (lat, lon) = graph.node_coords(idx);
            Ok(Coordinate { lat, lon, node_id })
        })
        .collect::<Result<Vec<_>, wander::GraphError>>()?;

    let payload = RoutePayload {
        distance_m: round1(result.distance),
        shortest_distance_m: round1(result.shortest_distance),
        overhead_pct: round1(result.overhead * 100.0),
        novelty_pct: round1(result.novelty * 100.0),
        num_edges: result.edges.len(),
        coordinates,
        edges: result.edges.clone(),
        instructions: result.instructions.clone(),
    };

    match output {
        Some(path) => {
            serde_json::to_writer_pretty(File::create(path)?, &payload)?;
            info!("route saved to {}", path.display());
        }
        None => {
            serde_json::to_writer_pretty(std::io::stdout().lock(), &payload)?;
            println!();
        }
    }

    if record {
        history.record_walk(&result.edges)?;
        info!("route recorded as walked ({} edges)", result.edges.len());
    }

    Ok(())
}

fn record(history_path: &std::path::Path, route_file: &std::path::Path) -> Result<(), Box<dyn Error>> {
    let saved: SavedRoute = serde_json::from_reader(File::open(route_file)?)?;

    let mut history = wander::WalkHistory::open(history_path)?;
    history.record_walk(&saved.edges)?;
    info!("recorded {} edges as walked", saved.edges.len());
    Ok(())
}

fn stats(history_path: &std::path::Path) -> Result<(), Box<dyn Error>> {
    let history = wander::WalkHistory::open(history_path)?;
    let stats = history.stats()?;

    info!("unique edges walked:     {}", stats.unique_edges_walked);
    info!("total edge traversals:   {}", stats.total_edge_traversals);
    info!("avg walks per edge:      {}", stats.avg_walks_per_edge);
    info!("max walks (single edge): {}", stats.max_walks_single_edge);
    info!(
        "first walk:              {}",
        stats.first_walk.as_deref().unwrap_or("N/A")
    );
    info!(
        "last walk:               {}",
        stats.last_walk.as_deref().unwrap_or("N/A")
    );
    Ok(())
}
