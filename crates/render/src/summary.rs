use std::collections::BTreeMap;

use nestgrid_kernel::World;

/// Read-only counts over a world, for the CLI and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSummary {
    pub tick: u64,
    pub seed: u64,
    pub width: i32,
    pub height: i32,
    pub grids: usize,
    pub entities: usize,
    pub movers: usize,
    /// Entity count per kind name.
    pub kinds: BTreeMap<&'static str, usize>,
}

impl WorldSummary {
    pub fn of(world: &World) -> Self {
        let mut kinds = BTreeMap::new();
        for (_, grid) in world.grids() {
            for entity in grid.simulatables() {
                *kinds.entry(entity.kind().name()).or_default() += 1;
            }
        }
        let root = world.root_grid();
        Self {
            tick: world.tick(),
            seed: world.seed(),
            width: root.width(),
            height: root.height(),
            grids: world.grid_count(),
            entities: world.entity_count(),
            movers: world.runnable_count(),
            kinds,
        }
    }
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "World: {}x{} tick={} seed={} grids={} entities={} movers={}",
            self.width, self.height, self.tick, self.seed, self.grids, self.entities, self.movers
        )?;
        for (kind, count) in &self.kinds {
            write!(f, "\n  {kind}: {count}")?;
        }
        Ok(())
    }
}
