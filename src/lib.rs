//! Trazar — infrastructure dependency resolution and routing planning.
//!
//! Declared resources, networks, and pipeline stages go in; a
//! deterministic, BLAKE3-fingerprinted plan comes out: creation order,
//! least-privilege grants, cross-network transit routes, and artifact
//! hand-offs, ready for an external provisioning engine.

pub mod cli;
pub mod core;
pub mod topology;
