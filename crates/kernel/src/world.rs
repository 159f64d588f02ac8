use nestgrid_common::{Direction, GridItem};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::entity::{EntityId, Kind, Simulatable, Step, Switched};
use crate::error::KernelError;
use crate::grid::Grid;
use crate::subgrid::SubGrid;

/// Arena key of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridId(pub u64);

/// Non-owning pointer to an entity inside a specific grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub grid: GridId,
    pub entity: EntityId,
}

/// Identity-free summary of one entity, for comparing outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntityState {
    pub grid: GridId,
    pub kind: &'static str,
    pub location: GridItem,
    pub direction: Option<Direction>,
}

/// The authoritative simulation state.
///
/// Owns every grid, keyed by [`GridId`]. The root grid has no parent; every
/// other grid is the child of exactly one sub-grid entity and is dropped
/// together with it. The runnable set tracks every mover and the grid it
/// currently lives in.
///
/// `Clone` is a full deep copy and is what checkpoints are made of.
#[derive(Debug, Clone)]
pub struct World {
    grids: BTreeMap<GridId, Grid>,
    root: GridId,
    next_grid: u64,
    runnable: BTreeMap<EntityId, GridId>,
    tick: u64,
    seed: u64,
}

impl World {
    /// A world with an empty `width` x `height` root grid and seed 0.
    pub fn new(width: i32, height: i32) -> Result<Self, KernelError> {
        Self::with_seed(width, height, 0)
    }

    pub fn with_seed(width: i32, height: i32, seed: u64) -> Result<Self, KernelError> {
        let root = GridId(0);
        let mut grids = BTreeMap::new();
        grids.insert(root, Grid::new(width, height)?);
        Ok(Self {
            grids,
            root,
            next_grid: 1,
            runnable: BTreeMap::new(),
            tick: 0,
            seed,
        })
    }

    pub fn root(&self) -> GridId {
        self.root
    }

    pub fn root_grid(&self) -> &Grid {
        &self.grids[&self.root]
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    pub fn grid(&self, id: GridId) -> Result<&Grid, KernelError> {
        self.grids.get(&id).ok_or(KernelError::UnknownGrid(id))
    }

    pub fn grids(&self) -> impl Iterator<Item = (GridId, &Grid)> {
        self.grids.iter().map(|(id, g)| (*id, g))
    }

    pub fn grid_count(&self) -> usize {
        self.grids.len()
    }

    /// Entities across every grid, sub-grid entities included.
    pub fn entity_count(&self) -> usize {
        self.grids.values().map(Grid::len).sum()
    }

    pub fn get(&self, r: EntityRef) -> Option<&Simulatable> {
        self.grids.get(&r.grid)?.get(r.entity)
    }

    /// Replace `self` with a deep copy of `other`.
    pub fn copy_from(&mut self, other: &World) {
        *self = other.clone();
    }

    /// Reset to an empty root grid of the given size.
    pub fn clear(&mut self, width: i32, height: i32) -> Result<(), KernelError> {
        let root = Grid::new(width, height)?;
        self.grids.clear();
        self.grids.insert(self.root, root);
        self.runnable.clear();
        self.tick = 0;
        Ok(())
    }

    /// Create a detached grid in the arena. It becomes a child once a
    /// sub-grid entity is built around it with [`World::add_sub_grid`].
    pub fn create_grid(&mut self, width: i32, height: i32) -> Result<GridId, KernelError> {
        let grid = Grid::new(width, height)?;
        Ok(self.insert_grid(grid))
    }

    /// Move a standalone grid into the arena, registering its movers.
    pub fn insert_grid(&mut self, mut grid: Grid) -> GridId {
        let id = GridId(self.next_grid);
        self.next_grid += 1;
        grid.set_parent(None);
        for e in grid.simulatables().filter(|e| e.is_mover()) {
            self.runnable.insert(e.id(), id);
        }
        self.grids.insert(id, grid);
        id
    }

    /// Add an entity to a grid. Returns its id, or `None` when it was
    /// dropped as a duplicate of an entity already in that cell.
    pub fn add(
        &mut self,
        grid: GridId,
        entity: Simulatable,
    ) -> Result<Option<EntityId>, KernelError> {
        let id = entity.id();
        let mover = entity.is_mover();
        let target = self.grid_mut(grid)?;
        target.insert(entity)?;
        let dropped = target.update_map_and_deduplicate();
        if mover {
            self.runnable.insert(id, grid);
        }
        let kept = !dropped.iter().any(|e| e.id() == id);
        self.discard(dropped);
        Ok(kept.then_some(id))
    }

    /// Wrap the detached grid `child` in a sub-grid entity anchored at
    /// `location` of grid `parent`.
    pub fn add_sub_grid(
        &mut self,
        parent: GridId,
        location: GridItem,
        child: GridId,
        source: Option<String>,
    ) -> Result<Option<EntityId>, KernelError> {
        if child == self.root || child == parent {
            return Err(KernelError::AlreadyEmbedded(child));
        }
        let child_grid = self.grid(child)?;
        if child_grid.parent().is_some() {
            return Err(KernelError::AlreadyEmbedded(child));
        }
        self.grid(parent)?;
        let mut sub = SubGrid::new(child, child_grid, location);
        sub.set_source(source);
        let entity = Simulatable::sub_grid(location, sub);
        let id = entity.id();
        let added = self.add(parent, entity)?;
        if added.is_some() {
            self.grid_mut(child)?
                .set_parent(Some(EntityRef { grid: parent, entity: id }));
        }
        Ok(added)
    }

    /// Move a standalone grid into the arena and embed it at once.
    pub fn embed(
        &mut self,
        parent: GridId,
        location: GridItem,
        grid: Grid,
    ) -> Result<Option<EntityId>, KernelError> {
        let child = self.insert_grid(grid);
        let added = self.add_sub_grid(parent, location, child, None);
        if !matches!(added, Ok(Some(_))) {
            self.drop_grid(child);
        }
        added
    }

    /// Remove one entity. A removed sub-grid takes its child grid with it.
    pub fn remove(&mut self, r: EntityRef) -> Option<Simulatable> {
        let removed = self.grids.get_mut(&r.grid)?.remove(r.entity)?;
        self.discard(vec![removed.clone()]);
        Some(removed)
    }

    /// Remove every entity covering `location` of `grid`.
    pub fn remove_at(
        &mut self,
        grid: GridId,
        location: GridItem,
    ) -> Result<Vec<Simulatable>, KernelError> {
        let removed = self.grid_mut(grid)?.remove_at(location);
        self.discard(removed.clone());
        Ok(removed)
    }

    /// Toggle an export marking and refresh the owning sub-grid's links.
    pub fn set_export(
        &mut self,
        grid: GridId,
        index: i32,
        direction: Direction,
        on: bool,
    ) -> Result<(), KernelError> {
        self.grid_mut(grid)?.set_export(index, direction, on);
        self.relink(grid)
    }

    /// Toggle a pad marking and refresh the owning sub-grid's links.
    pub fn set_pad(
        &mut self,
        grid: GridId,
        index: i32,
        direction: Direction,
        on: bool,
    ) -> Result<(), KernelError> {
        self.grid_mut(grid)?.set_pad(index, direction, on);
        self.relink(grid)
    }

    /// Rebuild the link tables of the sub-grid that owns `grid`, if any.
    pub fn relink(&mut self, grid: GridId) -> Result<(), KernelError> {
        let Some(parent) = self.grid(grid)?.parent() else {
            return Ok(());
        };
        let entity = self
            .get(parent)
            .ok_or(KernelError::UnknownEntity(parent.entity))?;
        let location = entity.location();
        let mut sub = entity
            .as_sub_grid()
            .cloned()
            .ok_or(KernelError::NotASubGrid(parent.entity))?;
        sub.relink(self.grid(grid)?, location);

        let parent_grid = self.grid_mut(parent.grid)?;
        if let Some(entity) = parent_grid.get_mut(parent.entity) {
            *entity.kind_mut() = Kind::SubGrid(sub);
        }
        let dropped = parent_grid.update_map_and_deduplicate();
        self.discard(dropped);
        Ok(())
    }

    pub(crate) fn grid_mut(&mut self, id: GridId) -> Result<&mut Grid, KernelError> {
        self.grids.get_mut(&id).ok_or(KernelError::UnknownGrid(id))
    }

    /// Unregister removed entities and drop the grids of removed sub-grids.
    fn discard(&mut self, removed: Vec<Simulatable>) {
        for entity in removed {
            self.runnable.remove(&entity.id());
            if let Some(sub) = entity.as_sub_grid() {
                self.drop_grid(sub.child());
            }
        }
    }

    fn drop_grid(&mut self, id: GridId) {
        let Some(grid) = self.grids.remove(&id) else {
            return;
        };
        let removed: Vec<Simulatable> = grid.simulatables().cloned().collect();
        self.discard(removed);
    }

    // --- stepping ---

    /// Snapshot of every mover registered to run this step.
    pub fn runnable(&self) -> Vec<EntityRef> {
        self.runnable
            .iter()
            .map(|(entity, grid)| EntityRef {
                grid: *grid,
                entity: *entity,
            })
            .collect()
    }

    pub fn runnable_count(&self) -> usize {
        self.runnable.len()
    }

    /// Write a compute result into an entity's pending slots.
    pub fn stage(&mut self, r: EntityRef, step: Step) -> Result<(), KernelError> {
        let entity = self
            .grid_mut(r.grid)?
            .get_mut(r.entity)
            .ok_or(KernelError::UnknownEntity(r.entity))?;
        entity.stage(r.grid, step);
        Ok(())
    }

    /// Forget every staged-but-uncommitted result.
    pub fn discard_staged(&mut self) {
        for grid in self.grids.values_mut() {
            for entity in grid.simulatables_mut() {
                entity.discard_staged();
            }
        }
    }

    /// Mutable handles to every staged entity, for the commit phase.
    pub fn staged_mut(&mut self) -> Vec<(GridId, &mut Simulatable)> {
        self.grids
            .iter_mut()
            .flat_map(|(id, grid)| grid.simulatables_mut().map(move |e| (*id, e)))
            .filter(|(_, e)| e.is_staged())
            .collect()
    }

    /// Finish the commit phase: apply removals, grid transfers and spawns,
    /// then reconcile every grid and advance the tick.
    pub fn apply_switched(&mut self, switched: Vec<Switched>) {
        let mut removed = Vec::new();
        let mut spawns = Vec::new();
        for s in switched {
            spawns.extend(s.spawns);
            if s.removed {
                if let Some(entity) = self.grids.get_mut(&s.grid).and_then(|g| g.take(s.entity)) {
                    removed.push(entity);
                }
                continue;
            }
            let Some(target) = s.transfer else {
                continue;
            };
            let Some(entity) = self.grids.get_mut(&s.grid).and_then(|g| g.take(s.entity)) else {
                continue;
            };
            self.place_committed(target, entity);
        }
        for spawn in spawns {
            self.place_committed(spawn.grid, spawn.entity);
        }
        self.discard(removed);

        let mut dropped = Vec::new();
        for grid in self.grids.values_mut() {
            dropped.extend(grid.update_map_and_deduplicate());
        }
        self.discard(dropped);

        self.tick += 1;
        self.seed = splitmix64(self.seed);
        tracing::trace!(tick = self.tick, entities = self.entity_count(), "step committed");
    }

    fn place_committed(&mut self, grid: GridId, entity: Simulatable) {
        let id = entity.id();
        let mover = entity.is_mover();
        let Some(target) = self.grids.get_mut(&grid) else {
            tracing::warn!(?grid, ?id, "target grid vanished, dropping entity");
            self.runnable.remove(&id);
            return;
        };
        match target.insert(entity) {
            Ok(_) if mover => {
                self.runnable.insert(id, grid);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(?id, "dropping entity at commit: {e}");
                self.runnable.remove(&id);
            }
        }
    }

    /// Run one full step on the calling thread: compute every runnable
    /// entity, then commit. On a compute error nothing is committed.
    pub fn step(&mut self) -> Result<(), KernelError> {
        let runnable = self.runnable();
        for r in &runnable {
            match self.compute(*r).and_then(|step| self.stage(*r, step)) {
                Ok(()) => {}
                Err(e) => {
                    self.discard_staged();
                    return Err(e);
                }
            }
        }
        let switched: Vec<Switched> = self
            .staged_mut()
            .into_iter()
            .filter_map(|(grid, e)| e.switch_state(grid))
            .collect();
        self.apply_switched(switched);
        Ok(())
    }

    /// Identity-free, sorted view of every entity.
    pub fn census(&self) -> Vec<EntityState> {
        let mut states: Vec<EntityState> = self
            .grids
            .iter()
            .flat_map(|(id, grid)| {
                grid.simulatables().map(move |e| EntityState {
                    grid: *id,
                    kind: e.kind().name(),
                    location: e.location(),
                    direction: e.direction(),
                })
            })
            .collect();
        states.sort();
        states
    }

    /// Every grid nested under `grid`, depth first, `grid` excluded.
    pub fn descendants(&self, grid: GridId) -> Vec<GridId> {
        let mut out = Vec::new();
        let mut stack = vec![grid];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            let Some(g) = self.grids.get(&id) else {
                continue;
            };
            for sub in g.simulatables().filter_map(Simulatable::as_sub_grid) {
                if seen.insert(sub.child()) {
                    out.push(sub.child());
                    stack.push(sub.child());
                }
            }
        }
        out
    }
}

/// Splitmix64 step, used to advance the world seed each tick.
pub(crate) fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
