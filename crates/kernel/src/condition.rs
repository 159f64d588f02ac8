use nestgrid_common::GridItem;
use serde::{Deserialize, Serialize};

use crate::grid::Grid;

/// Predicate consulted by a conditional barrier.
///
/// Evaluated against the grid the barrier lives in, on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    True,
    False,
    /// Holds while anything occupies `location` (wrapped).
    BlockExists { location: GridItem },
    /// Holds while nothing occupies `location` (wrapped).
    NotBlockExists { location: GridItem },
}

impl Condition {
    pub fn test(&self, grid: &Grid) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::BlockExists { location } => !grid.get_at_wrapped_location(*location).is_empty(),
            Self::NotBlockExists { location } => {
                grid.get_at_wrapped_location(*location).is_empty()
            }
        }
    }

    /// Referenced cell, if any.
    pub fn location(&self) -> Option<GridItem> {
        match self {
            Self::True | Self::False => None,
            Self::BlockExists { location } | Self::NotBlockExists { location } => Some(*location),
        }
    }
}
