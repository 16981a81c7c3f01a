//! Core planning logic — types, parsing, graph, resolution, grants, emission.

pub mod emitter;
pub mod error;
pub mod graph;
pub mod grants;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod types;
