//! Grid kernel: authoritative grid state, sub-grid linking, two-phase stepping.
//!
//! # Invariants
//! - Compute reads committed state only; commit is the only writer of
//!   committed state.
//! - The cell map of a grid is a derived cache, rebuilt explicitly by
//!   `Grid::update_map_and_deduplicate` after every structural change.
//! - A sub-grid's child grid is owned by the `World` arena; the child's
//!   `parent` is a non-owning reference back to the sub-grid entity.

pub mod checker;
pub mod condition;
pub mod entity;
pub mod error;
pub mod grid;
mod motion;
pub mod subgrid;
pub mod world;

pub use checker::{Checker, FaultListener, TopologyFault};
pub use condition::Condition;
pub use entity::{EntityId, Kind, Simulatable, Spawn, Sprite, Step, Switched};
pub use error::{KernelError, LinkAbsent};
pub use grid::Grid;
pub use subgrid::{InwardLink, SubGrid};
pub use world::{EntityRef, EntityState, GridId, World};
