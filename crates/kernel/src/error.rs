use nestgrid_common::{Direction, GridItem};

use crate::entity::EntityId;
use crate::world::GridId;

/// Errors from kernel operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error(
        "footprint {width}x{height} at {location} lies outside the {grid_width}x{grid_height} grid"
    )]
    OutOfBounds {
        location: GridItem,
        width: i32,
        height: i32,
        grid_width: i32,
        grid_height: i32,
    },
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidSize { width: i32, height: i32 },
    #[error("grid {0:?} does not exist")]
    UnknownGrid(GridId),
    #[error("entity {0:?} does not exist")]
    UnknownEntity(EntityId),
    #[error("grid {0:?} is already embedded in a sub-grid")]
    AlreadyEmbedded(GridId),
    #[error("entity {0:?} is not a sub-grid")]
    NotASubGrid(EntityId),
}

/// A face position of a sub-grid that is padded rather than exported.
///
/// Movers treat this as "no way in here" and fall back to ordinary edge rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no inward link on the {direction} face at index {index}")]
pub struct LinkAbsent {
    pub direction: Direction,
    pub index: i32,
}
