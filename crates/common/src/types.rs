use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Integer cell coordinate on a grid.
///
/// Ordered x-major, y-minor (the derived `Ord` follows field order).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridItem {
    pub x: i32,
    pub y: i32,
}

impl GridItem {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell one step in `direction`. Not wrapped.
    pub fn offset(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Translate by an arbitrary vector. Not wrapped.
    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Floor-mod both coordinates into `[0, width) x [0, height)`.
    pub fn wrapped(self, width: i32, height: i32) -> Self {
        Self::new(self.x.rem_euclid(width), self.y.rem_euclid(height))
    }

    /// Whether the cell lies inside `[0, width) x [0, height)`.
    pub fn within(self, width: i32, height: i32) -> bool {
        (0..width).contains(&self.x) && (0..height).contains(&self.y)
    }
}

impl fmt::Display for GridItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for GridItem {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// One of the four cardinal directions.
///
/// UP is +y and RIGHT is +x. Rotations are quarter turns: `rotate_left` is
/// counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    pub fn rotate_left(self) -> Self {
        match self {
            Self::Up => Self::Left,
            Self::Left => Self::Down,
            Self::Down => Self::Right,
            Self::Right => Self::Up,
        }
    }

    pub fn rotate_right(self) -> Self {
        match self {
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// True for LEFT and RIGHT, whose boundary edges are indexed along y.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// Unit step `(dx, dy)`.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, 1),
            Self::Down => (0, -1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    /// Stable slot for per-direction tables.
    pub fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown direction {0:?}, expected one of up/down/left/right")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "u" => Ok(Self::Up),
            "down" | "d" => Ok(Self::Down),
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

/// Classification of a grid boundary as seen from a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    /// The cell is not on the boundary in that direction.
    Empty,
    /// Boundary linked to a parent or child grid.
    Export,
    /// Boundary that absorbs whatever crosses it.
    Pad,
    /// Boundary that wraps around to the opposite side.
    Unmarked,
}

impl EdgeType {
    pub fn is_boundary(self) -> bool {
        !matches!(self, Self::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_are_inverse() {
        for d in Direction::ALL {
            assert_eq!(d.rotate_left().rotate_right(), d);
            assert_eq!(d.rotate_left().rotate_left(), d.opposite());
            assert_eq!(d.opposite().opposite(), d);
        }
    }

    #[test]
    fn rotate_left_is_counter_clockwise() {
        assert_eq!(Direction::Right.rotate_left(), Direction::Up);
        assert_eq!(Direction::Up.rotate_left(), Direction::Left);
        assert_eq!(Direction::Right.rotate_right(), Direction::Down);
    }

    #[test]
    fn horizontal_only_for_left_right() {
        assert!(Direction::Left.is_horizontal());
        assert!(Direction::Right.is_horizontal());
        assert!(!Direction::Up.is_horizontal());
        assert!(!Direction::Down.is_horizontal());
    }

    #[test]
    fn grid_item_orders_x_major() {
        let mut items = vec![
            GridItem::new(1, 0),
            GridItem::new(0, 5),
            GridItem::new(0, 1),
        ];
        items.sort();
        assert_eq!(
            items,
            vec![GridItem::new(0, 1), GridItem::new(0, 5), GridItem::new(1, 0)]
        );
    }

    #[test]
    fn wrapped_uses_floor_mod() {
        assert_eq!(GridItem::new(-1, 3).wrapped(3, 3), GridItem::new(2, 0));
        assert_eq!(GridItem::new(7, -4).wrapped(3, 3), GridItem::new(1, 2));
    }

    #[test]
    fn offset_follows_axis_convention() {
        let origin = GridItem::new(0, 0);
        assert_eq!(origin.offset(Direction::Up), GridItem::new(0, 1));
        assert_eq!(origin.offset(Direction::Left), GridItem::new(-1, 0));
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("Right".parse::<Direction>(), Ok(Direction::Right));
        assert_eq!("u".parse::<Direction>(), Ok(Direction::Up));
        assert!("north".parse::<Direction>().is_err());
    }
}
