//! Execution strategies for the two phases of a step.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use nestgrid_kernel::{EntityRef, GridId, Simulatable, Step, Switched, World};
use rayon::prelude::*;

use crate::config::{SimConfig, StepMode};
use crate::error::{SimError, StepError};

/// Compute phase: every runnable entity against committed state.
pub trait SemanticStep: Send + Sync {
    fn compute(
        &self,
        world: &World,
        runnable: &[EntityRef],
    ) -> Result<Vec<(EntityRef, Step)>, StepError>;
}

/// Commit phase: swap every staged entity's pending slots in.
pub trait StateSwitchStep: Send + Sync {
    fn switch(&self, staged: Vec<(GridId, &mut Simulatable)>) -> Vec<Switched>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Serial;

impl SemanticStep for Serial {
    fn compute(
        &self,
        world: &World,
        runnable: &[EntityRef],
    ) -> Result<Vec<(EntityRef, Step)>, StepError> {
        runnable
            .iter()
            .map(|r| world.compute(*r).map(|step| (*r, step)).map_err(StepError::from))
            .collect()
    }
}

impl StateSwitchStep for Serial {
    fn switch(&self, staged: Vec<(GridId, &mut Simulatable)>) -> Vec<Switched> {
        staged
            .into_iter()
            .filter_map(|(grid, entity)| entity.switch_state(grid))
            .collect()
    }
}

/// Fans each phase out over a shared rayon pool. The pool's join is the
/// barrier between phases.
#[derive(Debug, Clone)]
pub struct Parallel {
    pool: Arc<rayon::ThreadPool>,
}

impl Parallel {
    pub fn new(threads: usize) -> Result<Self, SimError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("nestgrid-worker-{i}"))
            .build()?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl SemanticStep for Parallel {
    fn compute(
        &self,
        world: &World,
        runnable: &[EntityRef],
    ) -> Result<Vec<(EntityRef, Step)>, StepError> {
        self.pool.install(|| {
            runnable
                .par_iter()
                .map(|r| world.compute(*r).map(|step| (*r, step)).map_err(StepError::from))
                .collect()
        })
    }
}

impl StateSwitchStep for Parallel {
    fn switch(&self, staged: Vec<(GridId, &mut Simulatable)>) -> Vec<Switched> {
        self.pool.install(|| {
            staged
                .into_par_iter()
                .filter_map(|(grid, entity)| entity.switch_state(grid))
                .collect()
        })
    }
}

/// The pair of strategies a simulator runs with.
#[derive(Clone)]
pub struct Strategies {
    pub semantic: Arc<dyn SemanticStep>,
    pub state_switch: Arc<dyn StateSwitchStep>,
}

impl Strategies {
    /// Build from config. One pool is shared when both phases are parallel.
    pub fn from_config(config: &SimConfig) -> Result<Self, SimError> {
        let parallel = if config.is_serial() {
            None
        } else {
            Some(Parallel::new(config.worker_threads)?)
        };
        let pick = |mode: StepMode| match (mode, &parallel) {
            (StepMode::Parallel, Some(p)) => Strategy::Parallel(p.clone()),
            _ => Strategy::Serial,
        };
        Ok(Self {
            semantic: pick(config.semantic_step).semantic(),
            state_switch: pick(config.state_switch_step).state_switch(),
        })
    }

    pub fn serial() -> Self {
        Self {
            semantic: Arc::new(Serial),
            state_switch: Arc::new(Serial),
        }
    }
}

enum Strategy {
    Serial,
    Parallel(Parallel),
}

impl Strategy {
    fn semantic(self) -> Arc<dyn SemanticStep> {
        match self {
            Self::Serial => Arc::new(Serial),
            Self::Parallel(p) => Arc::new(p),
        }
    }

    fn state_switch(self) -> Arc<dyn StateSwitchStep> {
        match self {
            Self::Serial => Arc::new(Serial),
            Self::Parallel(p) => Arc::new(p),
        }
    }
}

/// Run one full step: compute all, stage, then commit all.
///
/// A compute failure or panic aborts the step before anything is staged
/// into the world, so the world keeps its committed state. Returns the
/// number of entities computed.
pub fn run_step(world: &mut World, strategies: &Strategies) -> Result<usize, StepError> {
    let _span = tracing::info_span!("step", tick = world.tick()).entered();
    let runnable = world.runnable();

    let computed = panic::catch_unwind(AssertUnwindSafe(|| {
        strategies.semantic.compute(world, &runnable)
    }))
    .map_err(|payload| StepError::Panicked(panic_message(payload.as_ref())))??;

    for (r, step) in computed {
        if let Err(e) = world.stage(r, step) {
            world.discard_staged();
            return Err(e.into());
        }
    }
    let switched = strategies.state_switch.switch(world.staged_mut());
    world.apply_switched(switched);
    Ok(runnable.len())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestgrid_common::{Direction, GridItem};
    use nestgrid_kernel::KernelError;

    fn sample_world() -> World {
        let mut world = World::with_seed(9, 9, 5).unwrap();
        let root = world.root();
        for (x, y) in [(4, 4), (2, 6), (7, 1)] {
            world
                .add(root, Simulatable::barrier(GridItem::new(x, y)))
                .unwrap();
        }
        world
            .add(root, Simulatable::split_explorer(GridItem::new(0, 4), Direction::Right))
            .unwrap();
        world
            .add(root, Simulatable::random_explorer(GridItem::new(2, 0), Direction::Up))
            .unwrap();
        world
            .add(root, Simulatable::weak_explorer(GridItem::new(7, 7), Direction::Down))
            .unwrap();
        world
    }

    struct Exploding;

    impl SemanticStep for Exploding {
        fn compute(&self, _: &World, _: &[EntityRef]) -> Result<Vec<(EntityRef, Step)>, StepError> {
            panic!("boom");
        }
    }

    struct Failing;

    impl SemanticStep for Failing {
        fn compute(&self, _: &World, _: &[EntityRef]) -> Result<Vec<(EntityRef, Step)>, StepError> {
            Err(KernelError::InvalidSize { width: 0, height: 0 }.into())
        }
    }

    #[test]
    fn serial_and_parallel_agree() {
        let serial = Strategies::serial();
        let parallel = Strategies::from_config(&SimConfig {
            worker_threads: 3,
            ..SimConfig::default()
        })
        .unwrap();

        let mut a = sample_world();
        let mut b = a.clone();
        for _ in 0..25 {
            run_step(&mut a, &serial).unwrap();
            run_step(&mut b, &parallel).unwrap();
            assert_eq!(a.census(), b.census());
        }
        assert_eq!(a.tick(), 25);
    }

    #[test]
    fn mixed_modes_build() {
        let config = SimConfig {
            semantic_step: StepMode::Parallel,
            state_switch_step: StepMode::Serial,
            worker_threads: 2,
            ..SimConfig::default()
        };
        let strategies = Strategies::from_config(&config).unwrap();
        let mut world = sample_world();
        assert_eq!(run_step(&mut world, &strategies).unwrap(), 3);
    }

    #[test]
    fn panicking_compute_leaves_world_untouched() {
        let mut world = sample_world();
        let before = world.census();
        let strategies = Strategies {
            semantic: Arc::new(Exploding),
            state_switch: Arc::new(Serial),
        };
        let err = run_step(&mut world, &strategies).unwrap_err();
        assert!(matches!(err, StepError::Panicked(ref m) if m == "boom"));
        assert_eq!(world.census(), before);
        assert_eq!(world.tick(), 0);
    }

    #[test]
    fn failing_compute_leaves_world_untouched() {
        let mut world = sample_world();
        let before = world.census();
        let strategies = Strategies {
            semantic: Arc::new(Failing),
            state_switch: Arc::new(Serial),
        };
        assert!(matches!(
            run_step(&mut world, &strategies),
            Err(StepError::Compute(_))
        ));
        assert_eq!(world.census(), before);
    }

    #[test]
    fn parallel_pool_has_requested_size() {
        assert_eq!(Parallel::new(2).unwrap().threads(), 2);
    }
}
