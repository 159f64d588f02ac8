use nestgrid_common::{Direction, GridItem};

use crate::error::LinkAbsent;
use crate::grid::Grid;
use crate::world::GridId;

/// Where a face position of a sub-grid leads when crossed from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InwardLink {
    /// Boundary cell just inside the child grid.
    Exported(GridItem),
    /// Closed face position.
    Padded,
}

/// An entity that embeds a whole child grid.
///
/// The footprint presents one parent cell per marked (export or pad) index of
/// the child's boundary: height from the LEFT edge, width from the UP edge.
/// Face positions are compacted: position `k` on a face is the `k`-th marked
/// index of the matching child edge in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubGrid {
    child: GridId,
    child_width: i32,
    child_height: i32,
    width: i32,
    height: i32,
    /// Per direction: `(child index, is_export)` in ascending index order.
    marked: [Vec<(i32, bool)>; 4],
    inward: [Vec<InwardLink>; 4],
    /// Per direction, indexed by raw child edge index.
    outward: [Vec<Option<GridItem>>; 4],
    source: Option<String>,
}

impl SubGrid {
    /// Build the link tables for `grid` (the child, stored in the arena as
    /// `child`) placed with its footprint anchored at `location`.
    pub fn new(child: GridId, grid: &Grid, location: GridItem) -> Self {
        let mut sub = Self {
            child,
            child_width: 1,
            child_height: 1,
            width: 1,
            height: 1,
            marked: Default::default(),
            inward: Default::default(),
            outward: Default::default(),
            source: None,
        };
        sub.relink(grid, location);
        sub
    }

    /// Rebuild every table from the child's current markings.
    pub fn relink(&mut self, grid: &Grid, location: GridItem) {
        self.child_width = grid.width();
        self.child_height = grid.height();
        for direction in Direction::ALL {
            self.marked[direction.index()] = grid.marked_indices(direction);
        }
        self.height = self.marked[Direction::Left.index()].len().max(1) as i32;
        self.width = self.marked[Direction::Up.index()].len().max(1) as i32;

        for direction in Direction::ALL {
            let links = self.marked[direction.index()]
                .iter()
                .map(|&(index, export)| {
                    if export {
                        InwardLink::Exported(self.inside_cell(direction, index))
                    } else {
                        InwardLink::Padded
                    }
                })
                .collect();
            self.inward[direction.index()] = links;
        }
        self.relocate(location);
    }

    /// Recompute the outward table for a new anchor in the parent grid.
    pub fn relocate(&mut self, location: GridItem) {
        for direction in Direction::ALL {
            let length = if direction.is_horizontal() {
                self.child_height
            } else {
                self.child_width
            };
            let mut links = vec![None; length.max(0) as usize];
            for (k, &(index, export)) in self.marked[direction.index()].iter().enumerate() {
                if !export {
                    continue;
                }
                if let Some(slot) = links.get_mut(index as usize) {
                    *slot = Some(self.outside_cell(location, direction, k as i32));
                }
            }
            self.outward[direction.index()] = links;
        }
    }

    pub fn child(&self) -> GridId {
        self.child
    }

    /// Footprint `(width, height)` in parent cells.
    pub fn footprint(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn set_source(&mut self, source: Option<String>) {
        self.source = source;
    }

    pub fn inward_links(&self, face: Direction) -> &[InwardLink] {
        &self.inward[face.index()]
    }

    /// Child cell reached through face position `index`.
    pub fn inward_link(&self, face: Direction, index: i32) -> Result<GridItem, LinkAbsent> {
        let absent = LinkAbsent {
            direction: face,
            index,
        };
        let position = usize::try_from(index).map_err(|_| absent)?;
        match self.inward[face.index()].get(position) {
            Some(InwardLink::Exported(target)) => Ok(*target),
            Some(InwardLink::Padded) | None => Err(absent),
        }
    }

    pub fn is_inward_linked(&self, face: Direction, index: i32) -> bool {
        self.inward_link(face, index).is_ok()
    }

    pub fn outward_links(&self, direction: Direction) -> &[Option<GridItem>] {
        &self.outward[direction.index()]
    }

    /// Parent cell (unwrapped) a mover leaving the child through raw edge
    /// index `index` lands on. `None` for padded or unmarked indices.
    pub fn outward_link(&self, direction: Direction, index: i32) -> Option<GridItem> {
        let position = usize::try_from(index).ok()?;
        self.outward[direction.index()]
            .get(position)
            .copied()
            .flatten()
    }

    fn inside_cell(&self, direction: Direction, index: i32) -> GridItem {
        match direction {
            Direction::Left => GridItem::new(0, index),
            Direction::Right => GridItem::new(self.child_width - 1, index),
            Direction::Down => GridItem::new(index, 0),
            Direction::Up => GridItem::new(index, self.child_height - 1),
        }
    }

    fn outside_cell(&self, location: GridItem, direction: Direction, k: i32) -> GridItem {
        match direction {
            Direction::Right => location.translate(self.width, k),
            Direction::Left => location.translate(-1, k),
            Direction::Up => location.translate(k, self.height),
            Direction::Down => location.translate(k, -1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_with_marks() -> Grid {
        // 4x4 child: LEFT/RIGHT marked at y=1 (export) and y=2 (pad);
        // UP/DOWN exported at x=3.
        let mut grid = Grid::new(4, 4).unwrap();
        grid.set_export(1, Direction::Left, true);
        grid.set_pad(2, Direction::Left, true);
        grid.set_export(1, Direction::Right, true);
        grid.set_pad(2, Direction::Right, true);
        grid.set_export(3, Direction::Up, true);
        grid.set_export(3, Direction::Down, true);
        grid
    }

    #[test]
    fn footprint_counts_marked_indices() {
        let sub = SubGrid::new(GridId(1), &child_with_marks(), GridItem::new(0, 0));
        assert_eq!(sub.footprint(), (1, 2));
    }

    #[test]
    fn unmarked_child_has_unit_footprint() {
        let sub = SubGrid::new(GridId(1), &Grid::new(5, 5).unwrap(), GridItem::new(0, 0));
        assert_eq!(sub.footprint(), (1, 1));
        assert!(sub.inward_links(Direction::Left).is_empty());
    }

    #[test]
    fn inward_links_are_compacted_and_sorted() {
        let sub = SubGrid::new(GridId(1), &child_with_marks(), GridItem::new(0, 0));
        assert_eq!(
            sub.inward_links(Direction::Left),
            &[InwardLink::Exported(GridItem::new(0, 1)), InwardLink::Padded]
        );
        assert_eq!(sub.inward_link(Direction::Right, 0), Ok(GridItem::new(3, 1)));
        assert_eq!(sub.inward_link(Direction::Up, 0), Ok(GridItem::new(3, 3)));
        assert_eq!(sub.inward_link(Direction::Down, 0), Ok(GridItem::new(3, 0)));
    }

    #[test]
    fn padded_face_reports_link_absent() {
        let sub = SubGrid::new(GridId(1), &child_with_marks(), GridItem::new(0, 0));
        assert!(sub.is_inward_linked(Direction::Left, 0));
        assert!(!sub.is_inward_linked(Direction::Left, 1));
        assert_eq!(
            sub.inward_link(Direction::Left, 1),
            Err(LinkAbsent {
                direction: Direction::Left,
                index: 1
            })
        );
        assert!(sub.inward_link(Direction::Left, 7).is_err());
        assert!(sub.inward_link(Direction::Left, -1).is_err());
    }

    #[test]
    fn outward_links_sit_outside_the_footprint() {
        let sub = SubGrid::new(GridId(1), &child_with_marks(), GridItem::new(5, 5));
        // footprint is 1 wide, 2 high at (5,5)
        assert_eq!(sub.outward_link(Direction::Right, 1), Some(GridItem::new(6, 5)));
        assert_eq!(sub.outward_link(Direction::Left, 1), Some(GridItem::new(4, 5)));
        assert_eq!(sub.outward_link(Direction::Up, 3), Some(GridItem::new(5, 7)));
        assert_eq!(sub.outward_link(Direction::Down, 3), Some(GridItem::new(5, 4)));
        // padded and unmarked indices have no outward link
        assert_eq!(sub.outward_link(Direction::Right, 2), None);
        assert_eq!(sub.outward_link(Direction::Right, 0), None);
        assert_eq!(sub.outward_links(Direction::Left).len(), 4);
    }

    #[test]
    fn relocate_moves_outward_links() {
        let mut sub = SubGrid::new(GridId(1), &child_with_marks(), GridItem::new(0, 0));
        sub.relocate(GridItem::new(2, 0));
        assert_eq!(sub.outward_link(Direction::Left, 1), Some(GridItem::new(1, 0)));
    }
}
