// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

mod astar;
mod error;
mod instructions;
mod novelty;

pub use astar::shortest_path;
pub use error::RouteError;
pub use instructions::{generate_instructions, Instruction, TurnDirection};
pub use novelty::{novelty_route, path_to_edges, NoveltyParams, RouteResult};
