//! Topology primitives for the nestgrid engine.
//!
//! # Invariants
//! - Every type here is a plain value: `Copy`, no interior state.
//! - `GridItem` ordering is x-major, y-minor so serialized output is stable.

mod types;

pub use types::{Direction, EdgeType, GridItem, ParseDirectionError};
