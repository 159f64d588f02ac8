use nestgrid_kernel::World;

/// A deep copy of the world at a specific tick, for rollback around a run.
///
/// The hash covers tick, seed, and the identity-free census, so a restored
/// world can be checked against the state it was taken from.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub tick: u64,
    pub seed: u64,
    pub hash: u64,
    world: World,
}

impl Checkpoint {
    pub fn capture(world: &World) -> Self {
        Self {
            tick: world.tick(),
            seed: world.seed(),
            hash: state_hash(world),
            world: world.clone(),
        }
    }

    /// Whether the stored copy still matches the recorded hash.
    pub fn verify(&self) -> bool {
        self.tick == self.world.tick()
            && self.seed == self.world.seed()
            && self.hash == state_hash(&self.world)
    }

    /// Whether `world` is in exactly the captured state.
    pub fn matches(&self, world: &World) -> bool {
        self.hash == state_hash(world)
    }

    pub fn restore(&self) -> World {
        self.world.clone()
    }

    /// Overwrite `world` in place, keeping any shared handle to it valid.
    pub fn restore_into(&self, world: &mut World) {
        world.copy_from(&self.world);
    }
}

/// Ordered checkpoints of one run.
#[derive(Debug, Default)]
pub struct CheckpointStore {
    checkpoints: Vec<Checkpoint>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture `world` and return the checkpoint's index.
    pub fn take(&mut self, world: &World) -> usize {
        self.checkpoints.push(Checkpoint::capture(world));
        tracing::debug!(tick = world.tick(), index = self.checkpoints.len() - 1, "checkpoint taken");
        self.checkpoints.len() - 1
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Checkpoint> {
        self.checkpoints.get(index)
    }

    pub fn latest(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    /// World as of checkpoint `index`. Later checkpoints are discarded.
    pub fn rollback(&mut self, index: usize) -> Option<World> {
        let world = self.checkpoints.get(index)?.restore();
        self.checkpoints.truncate(index + 1);
        tracing::info!(tick = world.tick(), index, "rolled back");
        Some(world)
    }
}

fn state_hash(world: &World) -> u64 {
    fnv1a(&format!("{}{}{:?}", world.tick(), world.seed(), world.census()))
}

fn fnv1a(data: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in data.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
