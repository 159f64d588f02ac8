//! Movement and collision rules shared by every mover.
//!
//! Everything here reads committed state only and returns owned results, so
//! it can run from any number of threads against a shared `&World`.

use nestgrid_common::{Direction, EdgeType, GridItem};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::entity::{Kind, Simulatable, Spawn, Step};
use crate::error::KernelError;
use crate::grid::Grid;
use crate::world::{EntityRef, GridId, World, splitmix64};

/// Where one step in a direction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Destination {
    Arrive { grid: GridId, location: GridItem },
    /// Absorbed by a pad, or exported out of the root grid.
    Leave,
}

/// Cell on the leading side of a footprint, used for edge classification.
fn leading_cell(location: GridItem, direction: Direction, width: i32, height: i32) -> GridItem {
    match direction {
        Direction::Right => location.translate(width - 1, 0),
        Direction::Up => location.translate(0, height - 1),
        Direction::Left | Direction::Down => location,
    }
}

/// Position on the face of `sub_entity` that a mover travelling in
/// `direction` crosses when it enters `cell`. `None` if `cell` is not on
/// that face.
fn face_index(grid: &Grid, sub_entity: &Simulatable, cell: GridItem, direction: Direction) -> Option<i32> {
    let (width, height) = sub_entity.footprint();
    let anchor = sub_entity.location();
    let dx = (cell.x - anchor.x).rem_euclid(grid.width());
    let dy = (cell.y - anchor.y).rem_euclid(grid.height());
    if dx >= width || dy >= height {
        return None;
    }
    match direction {
        Direction::Right => (dx == 0).then_some(dy),
        Direction::Left => (dx == width - 1).then_some(dy),
        Direction::Up => (dy == 0).then_some(dx),
        Direction::Down => (dy == height - 1).then_some(dx),
    }
}

impl World {
    /// Whether a footprint at `from` is stopped from moving in `direction`.
    ///
    /// An open sub-grid face next to the footprint takes precedence over the
    /// boundary marking, as it does when the mover advances.
    pub fn blocked_in_direction(
        &self,
        grid_id: GridId,
        from: GridItem,
        direction: Direction,
        width: i32,
        height: i32,
    ) -> Result<bool, KernelError> {
        let grid = self.grid(grid_id)?;
        let adjacent = grid.cells_in_direction(from, direction, width, height);
        let mut entering = false;
        for &cell in &adjacent {
            entering |= self.entry(grid_id, cell, direction)?.is_some();
        }
        let lead = leading_cell(from, direction, width, height);
        if !entering && matches!(grid.grid_edge_in_direction(lead, direction), EdgeType::Export) {
            return match self.outward_target(grid, lead, direction)? {
                Some((parent, cell)) => self.cell_blocks(parent, cell, direction),
                None => Ok(false),
            };
        }
        for cell in adjacent {
            if self.cell_blocks(grid_id, cell, direction)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether a mover travelling in `direction` may not enter `cell`.
    fn cell_blocks(
        &self,
        grid_id: GridId,
        cell: GridItem,
        direction: Direction,
    ) -> Result<bool, KernelError> {
        let grid = self.grid(grid_id)?;
        for entity in grid.get_at_wrapped_location(cell) {
            if entity.is_blocking(grid) {
                return Ok(true);
            }
            let Some(sub) = entity.as_sub_grid() else {
                continue;
            };
            let Some(index) = face_index(grid, entity, grid.wrap(cell), direction) else {
                continue;
            };
            match sub.inward_link(direction.opposite(), index) {
                Ok(target) => {
                    if self.cell_blocks(sub.child(), target, direction)? {
                        return Ok(true);
                    }
                }
                Err(_) => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Parent grid and cell reached by leaving `grid` through the exported
    /// boundary cell `lead`. `None` at the root or on an unlinked index.
    fn outward_target(
        &self,
        grid: &Grid,
        lead: GridItem,
        direction: Direction,
    ) -> Result<Option<(GridId, GridItem)>, KernelError> {
        let Some(parent) = grid.parent() else {
            return Ok(None);
        };
        let parent_grid = self.grid(parent.grid)?;
        let sub = self
            .get(parent)
            .and_then(Simulatable::as_sub_grid)
            .ok_or(KernelError::NotASubGrid(parent.entity))?;
        let index = Grid::edge_index(lead, direction);
        Ok(sub
            .outward_link(direction, index)
            .map(|cell| (parent.grid, parent_grid.wrap(cell))))
    }

    /// Child grid and cell reached by crossing an export-linked sub-grid
    /// face that sits on `cell`.
    fn entry(
        &self,
        grid_id: GridId,
        cell: GridItem,
        direction: Direction,
    ) -> Result<Option<(GridId, GridItem)>, KernelError> {
        let grid = self.grid(grid_id)?;
        let cell = grid.wrap(cell);
        for entity in grid.get_at_strict_location(cell) {
            let Some(sub) = entity.as_sub_grid() else {
                continue;
            };
            let Some(index) = face_index(grid, entity, cell, direction) else {
                continue;
            };
            if let Ok(target) = sub.inward_link(direction.opposite(), index) {
                return Ok(Some((sub.child(), target)));
            }
        }
        Ok(None)
    }

    /// Land on `cell`, or fall through an open sub-grid face sitting there.
    fn arrive(
        &self,
        grid_id: GridId,
        cell: GridItem,
        direction: Direction,
    ) -> Result<Destination, KernelError> {
        match self.entry(grid_id, cell, direction)? {
            Some((child, target)) => self.arrive(child, target, direction),
            None => Ok(Destination::Arrive {
                grid: grid_id,
                location: self.grid(grid_id)?.wrap(cell),
            }),
        }
    }

    /// Where a footprint at `location` ends after one step in `direction`.
    ///
    /// Entering a sub-grid next to the mover is tried first; only then does
    /// the boundary marking decide between leaving, exporting and wrapping.
    pub(crate) fn destination(
        &self,
        grid_id: GridId,
        location: GridItem,
        direction: Direction,
        (width, height): (i32, i32),
    ) -> Result<Destination, KernelError> {
        let target = location.offset(direction);
        if let Some((child, cell)) = self.entry(grid_id, target, direction)? {
            return self.arrive(child, cell, direction);
        }
        let grid = self.grid(grid_id)?;
        let lead = leading_cell(location, direction, width, height);
        match grid.grid_edge_in_direction(lead, direction) {
            EdgeType::Pad => Ok(Destination::Leave),
            EdgeType::Export => match self.outward_target(grid, lead, direction)? {
                Some((parent, cell)) => self.arrive(parent, cell, direction),
                None => Ok(Destination::Leave),
            },
            EdgeType::Empty | EdgeType::Unmarked => Ok(Destination::Arrive {
                grid: grid_id,
                location: grid.wrap(target),
            }),
        }
    }

    /// Compute-phase move: the result lands in the pending slots.
    fn advance(
        &self,
        grid_id: GridId,
        entity: &Simulatable,
        direction: Direction,
    ) -> Result<Step, KernelError> {
        Ok(
            match self.destination(grid_id, entity.location(), direction, entity.footprint())? {
                Destination::Arrive { grid, location } => Step::moved(grid, location, direction),
                Destination::Leave => Step::remove(),
            },
        )
    }

    /// Move an entity that is not in any grid yet, writing its committed
    /// location directly. `None` if the move absorbed it.
    pub fn advance_now(
        &self,
        grid_id: GridId,
        mut entity: Simulatable,
        direction: Direction,
    ) -> Result<Option<Spawn>, KernelError> {
        entity.set_direction(direction);
        match self.destination(grid_id, entity.location(), direction, entity.footprint())? {
            Destination::Arrive { grid, location } => {
                entity.place(location);
                Ok(Some(Spawn { grid, entity }))
            }
            Destination::Leave => Ok(None),
        }
    }

    fn blocked(
        &self,
        grid_id: GridId,
        entity: &Simulatable,
        direction: Direction,
    ) -> Result<bool, KernelError> {
        let (width, height) = entity.footprint();
        self.blocked_in_direction(grid_id, entity.location(), direction, width, height)
    }

    /// Per-entity, per-step generator keyed on the world seed and the
    /// mover's committed state. Independent of evaluation order, of the
    /// executing thread and of process-wide entity ids.
    fn step_rng(&self, grid_id: GridId, entity: &Simulatable) -> Pcg32 {
        let at = entity.location();
        let cell = (u64::from(at.x as u32) << 32) | u64::from(at.y as u32);
        let heading = entity.direction().map_or(4, Direction::index) as u64;
        let mut state = splitmix64(self.seed() ^ grid_id.0);
        state = splitmix64(state ^ cell);
        Pcg32::seed_from_u64(splitmix64(state ^ heading))
    }

    /// Compute phase for one entity. Reads committed state only.
    pub fn compute(&self, r: EntityRef) -> Result<Step, KernelError> {
        let entity = self.get(r).ok_or(KernelError::UnknownEntity(r.entity))?;
        let Some(direction) = entity.direction() else {
            return Ok(Step::stay(r.grid, entity));
        };
        match entity.kind() {
            Kind::SplitExplorer => self.split_step(r.grid, entity, direction),
            Kind::RandomExplorer => self.random_step(r.grid, entity, direction),
            Kind::WeakExplorer => {
                if self.blocked(r.grid, entity, direction)? {
                    Ok(Step::remove())
                } else {
                    self.advance(r.grid, entity, direction)
                }
            }
            Kind::Barrier | Kind::ConditionalBarrier(_) | Kind::SubGrid(_) => {
                Ok(Step::stay(r.grid, entity))
            }
        }
    }

    fn split_step(
        &self,
        grid_id: GridId,
        entity: &Simulatable,
        direction: Direction,
    ) -> Result<Step, KernelError> {
        if !self.blocked(grid_id, entity, direction)? {
            return self.advance(grid_id, entity, direction);
        }
        let left = direction.rotate_left();
        let right = direction.rotate_right();
        let left_open = !self.blocked(grid_id, entity, left)?;
        let right_open = !self.blocked(grid_id, entity, right)?;
        match (left_open, right_open) {
            (true, true) => {
                let mut step = self.advance(grid_id, entity, left)?;
                let twin = Simulatable::split_explorer(entity.location(), right);
                if let Some(spawn) = self.advance_now(grid_id, twin, right)? {
                    step.spawns.push(spawn);
                }
                Ok(step)
            }
            (true, false) => self.advance(grid_id, entity, left),
            (false, true) => self.advance(grid_id, entity, right),
            (false, false) => Ok(Step::remove()),
        }
    }

    fn random_step(
        &self,
        grid_id: GridId,
        entity: &Simulatable,
        direction: Direction,
    ) -> Result<Step, KernelError> {
        if !self.blocked(grid_id, entity, direction)? {
            return self.advance(grid_id, entity, direction);
        }
        let mut open = Vec::with_capacity(2);
        for turn in [direction.rotate_left(), direction.rotate_right()] {
            if !self.blocked(grid_id, entity, turn)? {
                open.push(turn);
            }
        }
        if open.is_empty() {
            return Ok(Step::remove());
        }
        let pick = open[self.step_rng(grid_id, entity).random_range(0..open.len())];
        self.advance(grid_id, entity, pick)
    }
}
