use nestgrid_common::{Direction, GridItem};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::condition::Condition;
use crate::grid::Grid;
use crate::subgrid::SubGrid;
use crate::world::GridId;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an entity.
///
/// Identity is distinct from equality: two entities with different ids may
/// still compare equal by state (see [`Simulatable::same_state`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn new() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// The closed set of entity variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Barrier,
    ConditionalBarrier(Condition),
    SplitExplorer,
    RandomExplorer,
    WeakExplorer,
    SubGrid(SubGrid),
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Barrier => "barrier",
            Self::ConditionalBarrier(_) => "conditional_barrier",
            Self::SplitExplorer => "split_explorer",
            Self::RandomExplorer => "random_explorer",
            Self::WeakExplorer => "weak_explorer",
            Self::SubGrid(_) => "sub_grid",
        }
    }

    /// Directional variants that move every step.
    pub fn is_mover(&self) -> bool {
        matches!(
            self,
            Self::SplitExplorer | Self::RandomExplorer | Self::WeakExplorer
        )
    }
}

/// Opaque drawing descriptor for one footprint cell of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sprite {
    Barrier,
    ConditionalBarrier { blocking: bool },
    SplitExplorer(Direction),
    RandomExplorer(Direction),
    WeakExplorer(Direction),
    SubGrid { offset: GridItem, width: i32, height: i32 },
}

/// An entity created during compute, inserted into `grid` at commit.
#[derive(Debug, Clone)]
pub struct Spawn {
    pub grid: GridId,
    pub entity: Simulatable,
}

/// Result of the compute phase for one entity.
#[derive(Debug, Clone, Default)]
pub struct Step {
    /// Grid and cell to occupy after commit; `None` removes the entity.
    pub next: Option<(GridId, GridItem)>,
    pub direction: Option<Direction>,
    pub spawns: Vec<Spawn>,
}

impl Step {
    pub fn stay(grid: GridId, entity: &Simulatable) -> Self {
        Self {
            next: Some((grid, entity.location)),
            direction: entity.direction,
            spawns: Vec::new(),
        }
    }

    pub fn moved(grid: GridId, location: GridItem, direction: Direction) -> Self {
        Self {
            next: Some((grid, location)),
            direction: Some(direction),
            spawns: Vec::new(),
        }
    }

    pub fn remove() -> Self {
        Self::default()
    }

    pub fn is_removal(&self) -> bool {
        self.next.is_none()
    }
}

/// Structural work left over after an entity switched state at commit.
#[derive(Debug, Clone)]
pub struct Switched {
    pub grid: GridId,
    pub entity: EntityId,
    pub removed: bool,
    /// Target grid when the entity crossed into another grid.
    pub transfer: Option<GridId>,
    pub spawns: Vec<Spawn>,
}

/// A steppable entity occupying a footprint of one or more cells.
///
/// Committed state (`location`, `direction`) is what every other entity
/// observes. The compute phase fills the `next_*` slots, the spawn queue and
/// the removal flag; commit swaps them in.
#[derive(Debug, Clone)]
pub struct Simulatable {
    id: EntityId,
    kind: Kind,
    location: GridItem,
    direction: Option<Direction>,
    next_location: GridItem,
    next_direction: Option<Direction>,
    next_grid: Option<GridId>,
    spawned: Vec<Spawn>,
    remove: bool,
    staged: bool,
}

impl Simulatable {
    fn with_kind(kind: Kind, location: GridItem, direction: Option<Direction>) -> Self {
        Self {
            id: EntityId::new(),
            kind,
            location,
            direction,
            next_location: location,
            next_direction: direction,
            next_grid: None,
            spawned: Vec::new(),
            remove: false,
            staged: false,
        }
    }

    pub fn barrier(location: GridItem) -> Self {
        Self::with_kind(Kind::Barrier, location, None)
    }

    pub fn conditional_barrier(location: GridItem, condition: Condition) -> Self {
        Self::with_kind(Kind::ConditionalBarrier(condition), location, None)
    }

    pub fn split_explorer(location: GridItem, direction: Direction) -> Self {
        Self::with_kind(Kind::SplitExplorer, location, Some(direction))
    }

    pub fn random_explorer(location: GridItem, direction: Direction) -> Self {
        Self::with_kind(Kind::RandomExplorer, location, Some(direction))
    }

    /// The direction is a creation-time input; weak explorers never turn.
    pub fn weak_explorer(location: GridItem, direction: Direction) -> Self {
        Self::with_kind(Kind::WeakExplorer, location, Some(direction))
    }

    pub fn sub_grid(location: GridItem, sub: SubGrid) -> Self {
        Self::with_kind(Kind::SubGrid(sub), location, None)
    }

    /// Same state under a fresh identity.
    pub fn copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = EntityId::new();
        copy
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut Kind {
        &mut self.kind
    }

    pub fn location(&self) -> GridItem {
        self.location
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn next_location(&self) -> GridItem {
        self.next_location
    }

    pub fn next_direction(&self) -> Option<Direction> {
        self.next_direction
    }

    pub fn as_sub_grid(&self) -> Option<&SubGrid> {
        match &self.kind {
            Kind::SubGrid(sub) => Some(sub),
            _ => None,
        }
    }

    /// Footprint `(width, height)` in cells.
    pub fn footprint(&self) -> (i32, i32) {
        match &self.kind {
            Kind::SubGrid(sub) => sub.footprint(),
            _ => (1, 1),
        }
    }

    /// Every cell the footprint covers, unwrapped.
    pub fn footprint_cells(&self) -> impl Iterator<Item = GridItem> + '_ {
        let (width, height) = self.footprint();
        (0..width).flat_map(move |dx| (0..height).map(move |dy| self.location.translate(dx, dy)))
    }

    /// Display tie-break: higher draws on top.
    pub fn priority(&self) -> u8 {
        match self.kind {
            Kind::SubGrid(_) => 0,
            Kind::Barrier | Kind::ConditionalBarrier(_) => 1,
            Kind::WeakExplorer => 2,
            Kind::RandomExplorer => 3,
            Kind::SplitExplorer => 4,
        }
    }

    pub fn is_mover(&self) -> bool {
        self.kind.is_mover()
    }

    /// Whether this entity stops movers on its own cell. Sub-grids are
    /// face-dependent and handled by the movement rules.
    pub fn is_blocking(&self, grid: &Grid) -> bool {
        match &self.kind {
            Kind::Barrier => true,
            Kind::ConditionalBarrier(condition) => !condition.test(grid),
            _ => false,
        }
    }

    /// Same variant, location and direction. Identity is ignored.
    pub fn same_state(&self, other: &Self) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(&other.kind)
            && self.location == other.location
            && self.direction == other.direction
    }

    /// Descriptor for the footprint cell at `offset` from the anchor.
    pub fn sprite(&self, grid: &Grid, offset: GridItem) -> Sprite {
        let direction = self.direction.unwrap_or(Direction::Right);
        match &self.kind {
            Kind::Barrier => Sprite::Barrier,
            Kind::ConditionalBarrier(_) => Sprite::ConditionalBarrier {
                blocking: self.is_blocking(grid),
            },
            Kind::SplitExplorer => Sprite::SplitExplorer(direction),
            Kind::RandomExplorer => Sprite::RandomExplorer(direction),
            Kind::WeakExplorer => Sprite::WeakExplorer(direction),
            Kind::SubGrid(sub) => {
                let (width, height) = sub.footprint();
                Sprite::SubGrid {
                    offset,
                    width,
                    height,
                }
            }
        }
    }

    /// Set committed and pending location at once. Used for entities that
    /// are not yet in a grid, where no commit will follow.
    pub fn place(&mut self, location: GridItem) {
        self.location = location;
        self.next_location = location;
        if let Kind::SubGrid(sub) = &mut self.kind {
            sub.relocate(location);
        }
    }

    pub fn set_direction(&mut self, direction: Direction) {
        if self.direction.is_some() {
            self.direction = Some(direction);
            self.next_direction = Some(direction);
        }
    }

    /// Write a compute result into the pending slots.
    pub fn stage(&mut self, grid: GridId, step: Step) {
        match step.next {
            Some((next_grid, location)) => {
                self.next_location = location;
                self.next_grid = Some(next_grid).filter(|g| *g != grid);
                self.remove = false;
            }
            None => {
                self.next_location = self.location;
                self.next_grid = None;
                self.remove = true;
            }
        }
        if self.direction.is_some() {
            self.next_direction = step.direction.or(self.direction);
        }
        self.spawned = step.spawns;
        self.staged = true;
    }

    pub fn is_staged(&self) -> bool {
        self.staged
    }

    /// Drop any pending state without committing it.
    pub fn discard_staged(&mut self) {
        self.next_location = self.location;
        self.next_direction = self.direction;
        self.next_grid = None;
        self.spawned.clear();
        self.remove = false;
        self.staged = false;
    }

    /// Commit the pending slots. Returns the structural follow-up for the
    /// owning world, or `None` if nothing was staged.
    pub fn switch_state(&mut self, grid: GridId) -> Option<Switched> {
        if !self.staged {
            return None;
        }
        self.staged = false;
        let spawns = std::mem::take(&mut self.spawned);
        if self.remove {
            return Some(Switched {
                grid,
                entity: self.id,
                removed: true,
                transfer: None,
                spawns,
            });
        }
        self.location = self.next_location;
        self.direction = self.next_direction;
        if let Kind::SubGrid(sub) = &mut self.kind {
            sub.relocate(self.location);
        }
        Some(Switched {
            grid,
            entity: self.id,
            removed: false,
            transfer: self.next_grid.take(),
            spawns,
        })
    }
}
