use nestgrid_common::{Direction, EdgeType, GridItem};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::entity::{EntityId, Simulatable};
use crate::error::KernelError;
use crate::world::EntityRef;

/// A rectangular toroidal grid of cells.
///
/// Owns its entities. The cell map is a cache derived from the entity set and
/// is only brought up to date by [`Grid::update_map_and_deduplicate`].
#[derive(Debug, Clone)]
pub struct Grid {
    width: i32,
    height: i32,
    entities: BTreeMap<EntityId, Simulatable>,
    cells: HashMap<GridItem, BTreeSet<EntityId>>,
    exports: [BTreeSet<i32>; 4],
    pads: [BTreeSet<i32>; 4],
    parent: Option<EntityRef>,
}

impl Grid {
    pub fn new(width: i32, height: i32) -> Result<Self, KernelError> {
        if width < 1 || height < 1 {
            return Err(KernelError::InvalidSize { width, height });
        }
        Ok(Self {
            width,
            height,
            entities: BTreeMap::new(),
            cells: HashMap::new(),
            exports: Default::default(),
            pads: Default::default(),
            parent: None,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn parent(&self) -> Option<EntityRef> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<EntityRef>) {
        self.parent = parent;
    }

    /// Drop every entity and marking and resize. The parent link survives.
    pub fn clear(&mut self, width: i32, height: i32) -> Result<(), KernelError> {
        if width < 1 || height < 1 {
            return Err(KernelError::InvalidSize { width, height });
        }
        self.width = width;
        self.height = height;
        self.entities.clear();
        self.cells.clear();
        self.exports = Default::default();
        self.pads = Default::default();
        Ok(())
    }

    /// Deep copy of `other` into `self`, entity ids included.
    pub fn copy_from(&mut self, other: &Grid) {
        self.width = other.width;
        self.height = other.height;
        self.entities = other
            .entities
            .iter()
            .map(|(id, e)| (*id, e.clone()))
            .collect();
        self.exports = other.exports.clone();
        self.pads = other.pads.clone();
        self.parent = other.parent;
        self.cells.clear();
        self.update_map_and_deduplicate();
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn simulatables(&self) -> impl Iterator<Item = &Simulatable> {
        self.entities.values()
    }

    pub(crate) fn simulatables_mut(&mut self) -> impl Iterator<Item = &mut Simulatable> {
        self.entities.values_mut()
    }

    pub fn get(&self, id: EntityId) -> Option<&Simulatable> {
        self.entities.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Simulatable> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    fn check_fits(&self, entity: &Simulatable) -> Result<(), KernelError> {
        let (width, height) = entity.footprint();
        let location = entity.location();
        let far = location.translate(width - 1, height - 1);
        if location.within(self.width, self.height) && far.within(self.width, self.height) {
            Ok(())
        } else {
            Err(KernelError::OutOfBounds {
                location,
                width,
                height,
                grid_width: self.width,
                grid_height: self.height,
            })
        }
    }

    /// Insert without reconciling. The caller reconciles afterwards.
    pub(crate) fn insert(&mut self, entity: Simulatable) -> Result<EntityId, KernelError> {
        self.check_fits(&entity)?;
        let id = entity.id();
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Remove without reconciling.
    pub(crate) fn take(&mut self, id: EntityId) -> Option<Simulatable> {
        self.entities.remove(&id)
    }

    /// Add an entity whose footprint must lie inside the grid, then
    /// reconcile. Returns the entities dropped as duplicates, which may
    /// include the one just added.
    pub fn add(&mut self, entity: Simulatable) -> Result<Vec<Simulatable>, KernelError> {
        self.insert(entity)?;
        Ok(self.update_map_and_deduplicate())
    }

    /// Remove every entity whose footprint covers `location` exactly.
    pub fn remove_at(&mut self, location: GridItem) -> Vec<Simulatable> {
        let ids: Vec<EntityId> = self
            .cells
            .get(&location)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        let removed = ids.into_iter().filter_map(|id| self.take(id)).collect();
        self.update_map_and_deduplicate();
        removed
    }

    /// Remove one entity by identity.
    pub fn remove(&mut self, id: EntityId) -> Option<Simulatable> {
        let removed = self.take(id);
        if removed.is_some() {
            self.update_map_and_deduplicate();
        }
        removed
    }

    pub fn get_at_strict_location(&self, item: GridItem) -> Vec<&Simulatable> {
        self.cells
            .get(&item)
            .map(|set| set.iter().filter_map(|id| self.entities.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_at_wrapped_location(&self, item: GridItem) -> Vec<&Simulatable> {
        self.get_at_strict_location(self.wrap(item))
    }

    pub fn wrap(&self, item: GridItem) -> GridItem {
        item.wrapped(self.width, self.height)
    }

    /// Wrapped cells bordering a `width` x `height` footprint on one side.
    pub fn cells_in_direction(
        &self,
        location: GridItem,
        direction: Direction,
        width: i32,
        height: i32,
    ) -> Vec<GridItem> {
        let cells: Vec<GridItem> = match direction {
            Direction::Right => (0..height).map(|dy| location.translate(width, dy)).collect(),
            Direction::Left => (0..height).map(|dy| location.translate(-1, dy)).collect(),
            Direction::Up => (0..width).map(|dx| location.translate(dx, height)).collect(),
            Direction::Down => (0..width).map(|dx| location.translate(dx, -1)).collect(),
        };
        cells.into_iter().map(|c| self.wrap(c)).collect()
    }

    /// Entities bordering a footprint on one side, each listed once.
    pub fn get_in_direction(
        &self,
        location: GridItem,
        direction: Direction,
        width: i32,
        height: i32,
    ) -> Vec<&Simulatable> {
        let mut seen = BTreeSet::new();
        self.cells_in_direction(location, direction, width, height)
            .into_iter()
            .flat_map(|cell| self.get_at_strict_location(cell))
            .filter(|e| seen.insert(e.id()))
            .collect()
    }

    /// Index along the boundary edge in `direction`: y for LEFT/RIGHT, x for
    /// UP/DOWN.
    pub fn edge_index(location: GridItem, direction: Direction) -> i32 {
        if direction.is_horizontal() {
            location.y
        } else {
            location.x
        }
    }

    /// Length of the boundary edge in `direction`.
    pub fn edge_length(&self, direction: Direction) -> i32 {
        if direction.is_horizontal() {
            self.height
        } else {
            self.width
        }
    }

    pub fn grid_edge_in_direction(&self, location: GridItem, direction: Direction) -> EdgeType {
        let on_boundary = match direction {
            Direction::Up => location.y == self.height - 1,
            Direction::Down => location.y == 0,
            Direction::Left => location.x == 0,
            Direction::Right => location.x == self.width - 1,
        };
        if !on_boundary {
            return EdgeType::Empty;
        }
        let index = Self::edge_index(location, direction);
        if self.is_export(index, direction) {
            EdgeType::Export
        } else if self.is_pad(index, direction) {
            EdgeType::Pad
        } else {
            EdgeType::Unmarked
        }
    }

    pub fn is_export(&self, index: i32, direction: Direction) -> bool {
        self.exports[direction.index()].contains(&index)
    }

    pub fn is_pad(&self, index: i32, direction: Direction) -> bool {
        let padded = self.pads[direction.index()].contains(&index);
        debug_assert!(
            !(padded && self.is_export(index, direction)),
            "index {index} on {direction} is both exported and padded"
        );
        padded
    }

    pub fn exports(&self, direction: Direction) -> &BTreeSet<i32> {
        &self.exports[direction.index()]
    }

    pub fn pads(&self, direction: Direction) -> &BTreeSet<i32> {
        &self.pads[direction.index()]
    }

    /// Mark or unmark `index` on the `direction` edge as exported. Marking
    /// clears any pad on the same index.
    pub fn set_export(&mut self, index: i32, direction: Direction, on: bool) {
        let slot = direction.index();
        if on {
            self.pads[slot].remove(&index);
            self.exports[slot].insert(index);
        } else {
            self.exports[slot].remove(&index);
        }
        debug_assert!(self.exports[slot].is_disjoint(&self.pads[slot]));
    }

    /// Mark or unmark `index` on the `direction` edge as padded. Marking
    /// clears any export on the same index.
    pub fn set_pad(&mut self, index: i32, direction: Direction, on: bool) {
        let slot = direction.index();
        if on {
            self.exports[slot].remove(&index);
            self.pads[slot].insert(index);
        } else {
            self.pads[slot].remove(&index);
        }
        debug_assert!(self.exports[slot].is_disjoint(&self.pads[slot]));
    }

    /// Exported and padded indices of one edge merged in ascending order,
    /// tagged `true` for export.
    pub fn marked_indices(&self, direction: Direction) -> Vec<(i32, bool)> {
        let slot = direction.index();
        let mut marked: Vec<(i32, bool)> = self.exports[slot]
            .iter()
            .map(|&i| (i, true))
            .chain(self.pads[slot].iter().map(|&i| (i, false)))
            .collect();
        marked.sort_unstable();
        marked
    }

    /// Reconcile the cell map with the entity set.
    ///
    /// Stale entries (entity gone, or no longer covering the cell) are
    /// stripped first; then every entity is inserted at each wrapped cell of
    /// its footprint. An entity equal by state to one already in a cell is
    /// dropped from the grid. Entities are visited in id order, so the older
    /// one survives. Returns the dropped entities.
    pub fn update_map_and_deduplicate(&mut self) -> Vec<Simulatable> {
        let (width, height) = (self.width, self.height);
        let entities = &self.entities;
        self.cells.retain(|cell, ids| {
            ids.retain(|id| {
                entities.get(id).is_some_and(|e| {
                    e.footprint_cells()
                        .any(|c| c.wrapped(width, height) == *cell)
                })
            });
            !ids.is_empty()
        });

        let mut placed = BTreeSet::new();
        let mut duplicates = Vec::new();
        for (id, entity) in &self.entities {
            let clashes = entity.footprint_cells().any(|cell| {
                self.cells
                    .get(&cell.wrapped(width, height))
                    .is_some_and(|ids| {
                        ids.iter().any(|other| {
                            placed.contains(other)
                                && self.entities.get(other).is_some_and(|o| entity.same_state(o))
                        })
                    })
            });
            if clashes {
                duplicates.push(*id);
                continue;
            }
            for cell in entity.footprint_cells() {
                self.cells
                    .entry(cell.wrapped(width, height))
                    .or_default()
                    .insert(*id);
            }
            placed.insert(*id);
        }

        if duplicates.is_empty() {
            return Vec::new();
        }
        for cells in self.cells.values_mut() {
            cells.retain(|id| !duplicates.contains(id));
        }
        self.cells.retain(|_, ids| !ids.is_empty());
        let dropped: Vec<Simulatable> = duplicates
            .iter()
            .filter_map(|id| self.entities.remove(id))
            .collect();
        tracing::debug!(count = dropped.len(), "dropped duplicate entities");
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;

    #[test]
    fn rejects_non_positive_size() {
        assert!(Grid::new(0, 3).is_err());
        assert!(Grid::new(3, -1).is_err());
    }

    #[test]
    fn add_out_of_bounds_leaves_grid_unchanged() {
        let mut grid = Grid::new(3, 3).unwrap();
        let err = grid
            .add(Simulatable::barrier(GridItem::new(3, 0)))
            .unwrap_err();
        assert!(matches!(err, KernelError::OutOfBounds { .. }));
        assert!(grid.is_empty());
        assert!(grid.add(Simulatable::barrier(GridItem::new(-1, 0))).is_err());
    }

    #[test]
    fn strict_and_wrapped_lookup() {
        let mut grid = Grid::new(4, 3).unwrap();
        grid.add(Simulatable::barrier(GridItem::new(3, 2))).unwrap();
        assert_eq!(grid.get_at_strict_location(GridItem::new(3, 2)).len(), 1);
        assert!(grid.get_at_strict_location(GridItem::new(-1, -1)).is_empty());
        assert_eq!(grid.get_at_wrapped_location(GridItem::new(-1, -1)).len(), 1);
        assert_eq!(grid.get_at_wrapped_location(GridItem::new(7, 5)).len(), 1);
    }

    #[test]
    fn remove_at_clears_cell() {
        let mut grid = Grid::new(3, 3).unwrap();
        let at = GridItem::new(1, 1);
        grid.add(Simulatable::barrier(at)).unwrap();
        grid.add(Simulatable::split_explorer(at, Direction::Up)).unwrap();
        grid.add(Simulatable::barrier(GridItem::new(0, 0))).unwrap();
        assert_eq!(grid.remove_at(at).len(), 2);
        assert!(grid.get_at_strict_location(at).is_empty());
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn remove_by_identity() {
        let mut grid = Grid::new(3, 3).unwrap();
        let at = GridItem::new(1, 1);
        let keep = Simulatable::split_explorer(at, Direction::Up);
        let drop = Simulatable::split_explorer(at, Direction::Down);
        let drop_id = drop.id();
        grid.add(keep).unwrap();
        grid.add(drop).unwrap();
        assert!(grid.remove(drop_id).is_some());
        assert_eq!(grid.get_at_strict_location(at).len(), 1);
        assert!(grid.remove(drop_id).is_none());
    }

    #[test]
    fn get_in_direction_wraps() {
        let mut grid = Grid::new(3, 3).unwrap();
        grid.add(Simulatable::barrier(GridItem::new(0, 1))).unwrap();
        let found = grid.get_in_direction(GridItem::new(2, 1), Direction::Right, 1, 1);
        assert_eq!(found.len(), 1);
        let none = grid.get_in_direction(GridItem::new(2, 1), Direction::Up, 1, 1);
        assert!(none.is_empty());
    }

    #[test]
    fn cells_in_direction_spans_footprint() {
        let grid = Grid::new(5, 5).unwrap();
        let cells = grid.cells_in_direction(GridItem::new(1, 1), Direction::Right, 2, 3);
        assert_eq!(
            cells,
            vec![GridItem::new(3, 1), GridItem::new(3, 2), GridItem::new(3, 3)]
        );
        let below = grid.cells_in_direction(GridItem::new(1, 0), Direction::Down, 2, 1);
        assert_eq!(below, vec![GridItem::new(1, 4), GridItem::new(2, 4)]);
    }

    #[test]
    fn edge_classification() {
        let mut grid = Grid::new(4, 3).unwrap();
        grid.set_export(1, Direction::Right, true);
        grid.set_pad(2, Direction::Right, true);
        let edge = |x, y, d| grid.grid_edge_in_direction(GridItem::new(x, y), d);
        assert_eq!(edge(1, 1, Direction::Right), EdgeType::Empty);
        assert_eq!(edge(3, 1, Direction::Right), EdgeType::Export);
        assert_eq!(edge(3, 2, Direction::Right), EdgeType::Pad);
        assert_eq!(edge(3, 0, Direction::Right), EdgeType::Unmarked);
        assert_eq!(edge(2, 2, Direction::Up), EdgeType::Unmarked);
        assert_eq!(edge(2, 0, Direction::Down), EdgeType::Unmarked);
        assert_eq!(edge(0, 0, Direction::Left), EdgeType::Unmarked);
    }

    #[test]
    fn export_and_pad_stay_disjoint() {
        let mut grid = Grid::new(4, 4).unwrap();
        grid.set_export(2, Direction::Up, true);
        grid.set_pad(2, Direction::Up, true);
        assert!(grid.is_pad(2, Direction::Up));
        assert!(!grid.is_export(2, Direction::Up));

        grid.set_export(2, Direction::Up, true);
        assert!(grid.is_export(2, Direction::Up));
        assert!(!grid.is_pad(2, Direction::Up));

        grid.set_export(2, Direction::Up, false);
        assert!(!grid.is_export(2, Direction::Up));
        assert!(!grid.is_pad(2, Direction::Up));
    }

    #[test]
    fn marked_indices_merge_sorted() {
        let mut grid = Grid::new(5, 5).unwrap();
        grid.set_pad(3, Direction::Left, true);
        grid.set_export(0, Direction::Left, true);
        grid.set_export(4, Direction::Left, true);
        assert_eq!(
            grid.marked_indices(Direction::Left),
            vec![(0, true), (3, false), (4, true)]
        );
    }

    #[test]
    fn deduplicates_equal_entities_in_one_cell() {
        let mut grid = Grid::new(3, 3).unwrap();
        let at = GridItem::new(1, 1);
        let first = Simulatable::split_explorer(at, Direction::Up);
        let first_id = first.id();
        grid.add(first).unwrap();
        let dropped = grid
            .add(Simulatable::split_explorer(at, Direction::Up))
            .unwrap();
        assert_eq!(dropped.len(), 1);
        assert_eq!(grid.len(), 1);
        assert!(grid.contains(first_id));

        // different direction is not a duplicate
        grid.add(Simulatable::split_explorer(at, Direction::Left))
            .unwrap();
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn stale_cells_are_stripped_after_move() {
        let mut grid = Grid::new(3, 3).unwrap();
        let e = Simulatable::split_explorer(GridItem::new(0, 0), Direction::Right);
        let id = e.id();
        grid.add(e).unwrap();
        grid.get_mut(id).unwrap().place(GridItem::new(1, 0));
        // the cache is stale until reconciled
        assert_eq!(grid.get_at_strict_location(GridItem::new(0, 0)).len(), 1);
        grid.update_map_and_deduplicate();
        assert!(grid.get_at_strict_location(GridItem::new(0, 0)).is_empty());
        assert_eq!(grid.get_at_strict_location(GridItem::new(1, 0)).len(), 1);
    }

    #[test]
    fn copy_from_is_deep() {
        let mut grid = Grid::new(2, 2).unwrap();
        grid.set_export(0, Direction::Up, true);
        grid.add(Simulatable::conditional_barrier(
            GridItem::new(0, 0),
            Condition::True,
        ))
        .unwrap();
        let mut copy = Grid::new(1, 1).unwrap();
        copy.copy_from(&grid);
        grid.clear(1, 1).unwrap();
        assert_eq!((copy.width(), copy.height()), (2, 2));
        assert_eq!(copy.len(), 1);
        assert!(copy.is_export(0, Direction::Up));
        assert_eq!(copy.get_at_strict_location(GridItem::new(0, 0)).len(), 1);
    }
}
