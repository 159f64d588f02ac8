//! On-disk shape of a world.
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "seed": 0,
//!   "grid": {
//!     "width": 3,
//!     "height": 3,
//!     "exports": { "left": [1] },
//!     "pads": {},
//!     "entities": [
//!       { "kind": "split_explorer", "location": { "x": 0, "y": 1 }, "direction": "RIGHT" },
//!       { "kind": "sub_grid", "location": { "x": 1, "y": 1 }, "source": "child.json" }
//!     ]
//!   }
//! }
//! ```

use nestgrid_common::{Direction, GridItem};
use nestgrid_kernel::Condition;
use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u32 = 1;

/// A whole saved world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldDoc {
    pub format_version: u32,
    #[serde(default)]
    pub seed: u64,
    pub grid: GridDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDoc {
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub exports: EdgeMarks,
    #[serde(default)]
    pub pads: EdgeMarks,
    #[serde(default)]
    pub entities: Vec<EntityDoc>,
}

/// Marked indices per edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMarks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub up: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub down: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub left: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub right: Vec<i32>,
}

impl EdgeMarks {
    pub fn get(&self, direction: Direction) -> &[i32] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut Vec<i32> {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
        }
    }
}

/// One entity: kind tag, anchor, and the kind's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityDoc {
    Barrier {
        location: GridItem,
    },
    ConditionalBarrier {
        location: GridItem,
        condition: Condition,
    },
    SplitExplorer {
        location: GridItem,
        direction: Direction,
    },
    RandomExplorer {
        location: GridItem,
        direction: Direction,
    },
    WeakExplorer {
        location: GridItem,
        direction: Direction,
    },
    SubGrid {
        location: GridItem,
        /// Path of a separate document holding the child grid, relative to
        /// the referencing file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        /// Inline child grid. Takes precedence over `source`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grid: Option<Box<GridDoc>>,
    },
}

impl EntityDoc {
    pub fn location(&self) -> GridItem {
        match self {
            Self::Barrier { location }
            | Self::ConditionalBarrier { location, .. }
            | Self::SplitExplorer { location, .. }
            | Self::RandomExplorer { location, .. }
            | Self::WeakExplorer { location, .. }
            | Self::SubGrid { location, .. } => *location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kinds_are_tagged() {
        let doc = EntityDoc::SplitExplorer {
            location: GridItem::new(0, 0),
            direction: Direction::Right,
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"split_explorer","location":{"x":0,"y":0},"direction":"RIGHT"}"#
        );
    }

    #[test]
    fn conditions_nest_with_their_own_tag() {
        let json = r#"{"kind":"conditional_barrier","location":{"x":1,"y":2},
            "condition":{"type":"not_block_exists","location":{"x":0,"y":0}}}"#;
        let doc: EntityDoc = serde_json::from_str(json).unwrap();
        assert_eq!(
            doc,
            EntityDoc::ConditionalBarrier {
                location: GridItem::new(1, 2),
                condition: Condition::NotBlockExists {
                    location: GridItem::new(0, 0)
                },
            }
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = serde_json::from_str::<EntityDoc>(r#"{"kind":"teleporter","location":{"x":0,"y":0}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("teleporter"));
    }

    #[test]
    fn empty_marks_are_omitted() {
        let mut marks = EdgeMarks::default();
        marks.get_mut(Direction::Left).push(2);
        assert_eq!(serde_json::to_string(&marks).unwrap(), r#"{"left":[2]}"#);
        assert_eq!(marks.get(Direction::Left), &[2]);
    }
}
