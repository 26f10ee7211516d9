// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use serde::Serialize;

use crate::geo::{bearing, haversine};
use crate::graph::CompactGraph;

/// Classified maneuver at the start of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    Start,
    Straight,
    SlightLeft,
    SlightRight,
    Left,
    Right,
    SharpLeft,
    SharpRight,
    UTurn,
    Arrive,
}

impl TurnDirection {
    fn phrase(self) -> &'static str {
        match self {
            Self::Start => "Head",
            Self::Straight => "Continue",
            Self::SlightLeft => "Turn slight left",
            Self::SlightRight => "Turn slight right",
            Self::Left => "Turn left",
            Self::Right => "Turn right",
            Self::SharpLeft => "Turn sharp left",
            Self::SharpRight => "Turn sharp right",
            Self::UTurn => "Make a U-turn",
            Self::Arrive => "Arrive",
        }
    }
}

/// One turn-by-turn navigation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub instruction: String,
    pub street_name: Option<String>,
    pub street_description: String,
    pub distance: f64,
    pub turn_direction: TurnDirection,
    pub turn_angle: f64,
    pub start_lat: f64,
    pub start_lon: f64,
}

const COMPASS: [&str; 8] = [
    "north",
    "northeast",
    "east",
    "southeast",
    "south",
    "southwest",
    "west",
    "northwest",
];

fn compass_direction(bearing_deg: f64) -> &'static str {
    COMPASS[((bearing_deg + 22.5) % 360.0 / 45.0) as usize % 8]
}

/// Fallback wording for unnamed edges, by highway class.
fn highway_description(highway: &str) -> &'static str {
    match highway {
        "footway" => "footpath",
        "path" => "path",
        "pedestrian" => "pedestrian way",
        "steps" => "steps",
        "cycleway" => "cycleway",
        "service" => "service road",
        "track" => "track",
        _ => "road",
    }
}

/// Classifies a turn from its signed angle (negative = left, positive = right).
fn classify_turn(angle: f64) -> TurnDirection {
    let left = angle < 0.0;
    match angle.abs() {
        a if a < 15.0 => TurnDirection::Straight,
        a if a < 45.0 => {
            if left {
                TurnDirection::SlightLeft
            } else {
                TurnDirection::SlightRight
            }
        }
        a if a < 120.0 => {
            if left {
                TurnDirection::Left
            } else {
                TurnDirection::Right
            }
        }
        a if a < 160.0 => {
            if left {
                TurnDirection::SharpLeft
            } else {
                TurnDirection::SharpRight
            }
        }
        _ => TurnDirection::UTurn,
    }
}

/// Normalizes an angle difference to `(-180, 180]`.
fn normalize_angle(mut angle: f64) -> f64 {
    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle < -180.0 {
        angle += 360.0;
    }
    angle
}

/// One traversed edge, annotated for instruction synthesis.
struct EdgeInfo {
    bearing: f64,
    distance: f64,
    name: Option<String>,
    effective_name: String,
    start: usize,
}

/// Adjacent edges sharing an effective name, merged into one step.
struct StepGroup {
    effective_name: String,
    street_name: Option<String>,
    total_distance: f64,
    entry_bearing: f64,
    exit_bearing: f64,
    start: usize,
}

/// Generates turn-by-turn navigation instructions for a node path.
///
/// Adjacent edges sharing an effective street name merge into a single step;
/// the maneuver at each step boundary is classified from the angle between
/// the previous step's exit bearing and this step's entry bearing. A terminal
/// arrive step is always appended.
///
/// Returns `None` when the graph carries no name metadata, when the path has
/// fewer than two nodes, or when the path references unknown nodes.
pub fn generate_instructions(g: &CompactGraph, path: &[i64]) -> Option<Vec<Instruction>> {
    if !g.has_name_data() || path.len() < 2 {
        return None;
    }

    let indices = path
        .iter()
        .map(|&osm_id| g.idx_for_osm_id(osm_id).ok())
        .collect::<Option<Vec<_>>>()?;

    let edges: Vec<EdgeInfo> = indices
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let (u_idx, v_idx) = (pair[0], pair[1]);
            let (lat1, lon1) = g.node_coords(u_idx);
            let (lat2, lon2) = g.node_coords(v_idx);

            let name = g.edge_name(u_idx, v_idx).map(str::to_string);
            let highway = g.edge_highway(u_idx, v_idx);
            let effective_name = match (&name, highway) {
                (Some(name), _) => name.clone(),
                (None, Some(highway)) => highway_description(highway).to_string(),
                (None, None) => "road".to_string(),
            };

            EdgeInfo {
                bearing: bearing(lat1, lon1, lat2, lon2),
                distance: haversine(lat1, lon1, lat2, lon2),
                name,
                effective_name,
                start: i,
            }
        })
        .collect();

    // Merge runs of edges sharing an effective name
    let mut groups: Vec<StepGroup> = Vec::new();
    let mut group_start = 0;
    while group_start < edges.len() {
        let mut group_end = group_start + 1;
        while group_end < edges.len()
            && edges[group_end].effective_name == edges[group_start].effective_name
        {
            group_end += 1;
        }

        let run = &edges[group_start..group_end];
        groups.push(StepGroup {
            effective_name: run[0].effective_name.clone(),
            street_name: run[0].name.clone(),
            total_distance: run.iter().map(|e| e.distance).sum(),
            entry_bearing: run[0].bearing,
            exit_bearing: run[run.len() - 1].bearing,
            start: run[0].start,
        });
        group_start = group_end;
    }

    let mut steps: Vec<Instruction> = Vec::with_capacity(groups.len() + 1);
    for (i, group) in groups.iter().enumerate() {
        let (start_lat, start_lon) = g.node_coords(indices[group.start]);

        let (instruction, turn_direction, turn_angle) = if i == 0 {
            (
                format!(
                    "Head {} on {}",
                    compass_direction(group.entry_bearing),
                    group.effective_name
                ),
                TurnDirection::Start,
                0.0,
            )
        } else {
            let angle = normalize_angle(group.entry_bearing - groups[i - 1].exit_bearing);
            let direction = classify_turn(angle);
            let joiner = if direction == TurnDirection::Straight {
                "on"
            } else {
                "onto"
            };
            (
                format!("{} {} {}", direction.phrase(), joiner, group.effective_name),
                direction,
                angle,
            )
        };

        steps.push(Instruction {
            instruction,
            street_name: group.street_name.clone(),
            street_description: group.effective_name.clone(),
            distance: group.total_distance,
            turn_direction,
            turn_angle,
            start_lat,
            start_lon,
        });
    }

    let (end_lat, end_lon) = g.node_coords(indices[indices.len() - 1]);
    steps.push(Instruction {
        instruction: "Arrive at destination".to_string(),
        street_name: None,
        street_description: String::new(),
        distance: 0.0,
        turn_direction: TurnDirection::Arrive,
        turn_angle: 0.0,
        start_lat: end_lat,
        start_lon: end_lon,
    });

    Some(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::triangle_graph;

    #[test]
    fn turn_classification_bands() {
        assert_eq!(classify_turn(0.0), TurnDirection::Straight);
        assert_eq!(classify_turn(14.9), TurnDirection::Straight);
        assert_eq!(classify_turn(-14.9), TurnDirection::Straight);
        assert_eq!(classify_turn(15.0), TurnDirection::SlightRight);
        assert_eq!(classify_turn(-15.0), TurnDirection::SlightLeft);
        assert_eq!(classify_turn(85.0), TurnDirection::Right);
        assert_eq!(classify_turn(-85.0), TurnDirection::Left);
        assert_eq!(classify_turn(120.0), TurnDirection::SharpRight);
        assert_eq!(classify_turn(-150.0), TurnDirection::SharpLeft);
        assert_eq!(classify_turn(160.0), TurnDirection::UTurn);
        assert_eq!(classify_turn(-179.0), TurnDirection::UTurn);
    }

    #[test]
    fn bearing_difference_classification() {
        // Exit 10°, entry 95°: an 85° right turn
        assert_eq!(classify_turn(normalize_angle(95.0 - 10.0)), TurnDirection::Right);
        // Exit 10°, entry 355°: a 15° left drift
        assert_eq!(
            classify_turn(normalize_angle(355.0 - 10.0)),
            TurnDirection::SlightLeft
        );
    }

    #[test]
    fn compass_sectors() {
        assert_eq!(compass_direction(0.0), "north");
        assert_eq!(compass_direction(22.4), "north");
        assert_eq!(compass_direction(22.5), "northeast");
        assert_eq!(compass_direction(90.0), "east");
        assert_eq!(compass_direction(180.0), "south");
        assert_eq!(compass_direction(270.0), "west");
        assert_eq!(compass_direction(337.4), "northwest");
        assert_eq!(compass_direction(337.5), "north");
    }

    #[test]
    fn single_edge_path_has_two_steps() {
        let g = triangle_graph();
        let steps = generate_instructions(&g, &[1, 2]).unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].instruction, "Head east on Market Street");
        assert_eq!(steps[0].turn_direction, TurnDirection::Start);
        assert_eq!(steps[0].street_name.as_deref(), Some("Market Street"));
        assert!((steps[0].distance - 111.195).abs() < 0.01);

        assert_eq!(steps[1].instruction, "Arrive at destination");
        assert_eq!(steps[1].turn_direction, TurnDirection::Arrive);
        assert_eq!(steps[1].distance, 0.0);
    }

    #[test]
    fn named_streets_split_into_steps() {
        let g = triangle_graph();
        let steps = generate_instructions(&g, &[1, 2, 3]).unwrap();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].instruction, "Head east on Market Street");
        // Exit bearing 90° (due east), entry bearing 315° (northwest): sharp left
        assert_eq!(steps[1].turn_direction, TurnDirection::SharpLeft);
        assert_eq!(steps[1].instruction, "Turn sharp left onto Valencia Street");
        assert_eq!(steps[2].turn_direction, TurnDirection::Arrive);
    }

    #[test]
    fn unnamed_edge_falls_back_to_highway_description() {
        let g = triangle_graph();
        let steps = generate_instructions(&g, &[2, 1, 3]).unwrap();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].instruction, "Head west on Market Street");
        assert_eq!(steps[1].street_name, None);
        assert_eq!(steps[1].street_description, "footpath");
        assert_eq!(steps[1].turn_direction, TurnDirection::Right);
        assert_eq!(steps[1].instruction, "Turn right onto footpath");
    }

    #[test]
    fn short_paths_have_no_instructions() {
        let g = triangle_graph();
        assert_eq!(generate_instructions(&g, &[1]), None);
        assert_eq!(generate_instructions(&g, &[]), None);
    }

    #[test]
    fn unknown_nodes_have_no_instructions() {
        let g = triangle_graph();
        assert_eq!(generate_instructions(&g, &[1, 42]), None);
    }
}
