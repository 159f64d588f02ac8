use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nestgrid_kernel::World;

use crate::config::SimConfig;
use crate::error::{SimError, StepError};
use crate::pace::Pacer;
use crate::strategy::{Strategies, run_step};

/// Counters readable while the loop runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Steps committed.
    pub steps: u64,
    /// Cycles skipped because the world lock was busy.
    pub skipped: u64,
    /// Steps aborted by a compute failure.
    pub aborted: u64,
}

impl std::fmt::Display for SimStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "steps={} skipped={} aborted={}",
            self.steps, self.skipped, self.aborted
        )
    }
}

#[derive(Debug, Default)]
struct Shared {
    running: AtomicBool,
    steps: AtomicU64,
    skipped: AtomicU64,
    aborted: AtomicU64,
    rate_bits: AtomicU64,
    rate_changed: AtomicBool,
}

impl Shared {
    fn rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    fn stats(&self) -> SimStats {
        SimStats {
            steps: self.steps.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }
}

/// Drives a shared [`World`] on a dedicated thread at a fixed rate.
///
/// Observers clone [`Simulator::world`] and take read locks. The loop takes
/// the write lock for each step with a short timeout and skips the cycle
/// when it cannot get it.
pub struct Simulator {
    world: Arc<RwLock<World>>,
    config: SimConfig,
    strategies: Strategies,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Simulator {
    pub fn new(world: World, config: SimConfig) -> Result<Self, SimError> {
        Self::with_shared(Arc::new(RwLock::new(world)), config)
    }

    pub fn with_shared(world: Arc<RwLock<World>>, config: SimConfig) -> Result<Self, SimError> {
        let strategies = Strategies::from_config(&config)?;
        Ok(Self::with_strategies(world, config, strategies))
    }

    pub fn with_strategies(
        world: Arc<RwLock<World>>,
        config: SimConfig,
        strategies: Strategies,
    ) -> Self {
        if let Some(seed) = config.seed {
            world
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .set_seed(seed);
        }
        let shared = Shared {
            rate_bits: AtomicU64::new(config.steps_per_second.to_bits()),
            ..Shared::default()
        };
        Self {
            world,
            config,
            strategies,
            shared: Arc::new(shared),
            handle: None,
        }
    }

    pub fn world(&self) -> Arc<RwLock<World>> {
        Arc::clone(&self.world)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> SimStats {
        self.shared.stats()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn steps_per_second(&self) -> f64 {
        self.shared.rate()
    }

    /// Change the target rate. Takes effect at the next cycle of a running
    /// loop and resets its drift window.
    pub fn set_steps_per_second(&self, rate: f64) {
        self.shared.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
        self.shared.rate_changed.store(true, Ordering::Release);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Run one step on the calling thread. `Ok(false)` when the lock timed
    /// out and the cycle was skipped.
    pub fn step_once(&self) -> Result<bool, StepError> {
        step_shared(&self.world, &self.strategies, &self.shared, self.config.lock_timeout())
    }

    /// Spawn the simulation thread.
    pub fn start(&mut self) -> Result<(), SimError> {
        if self.handle.is_some() {
            return Err(SimError::AlreadyRunning);
        }
        self.shared.running.store(true, Ordering::Release);
        let ctx = LoopContext {
            world: Arc::clone(&self.world),
            strategies: self.strategies.clone(),
            shared: Arc::clone(&self.shared),
            lock_timeout: self.config.lock_timeout(),
            drift_window: self.config.drift_window,
            max_steps: self.config.max_steps,
        };
        let handle = thread::Builder::new()
            .name("nestgrid-sim".into())
            .spawn(move || ctx.run())
            .map_err(|e| {
                self.shared.running.store(false, Ordering::Release);
                SimError::Spawn(e)
            })?;
        tracing::info!(rate = self.shared.rate(), "simulation started");
        self.handle = Some(handle);
        Ok(())
    }

    /// Ask the loop to stop and wait for the in-flight step to finish.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
        self.join();
    }

    /// Wait for the loop to end on its own (for example after `max_steps`).
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("simulation thread panicked");
            }
            tracing::info!(stats = %self.stats(), "simulation stopped");
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    world: Arc<RwLock<World>>,
    strategies: Strategies,
    shared: Arc<Shared>,
    lock_timeout: Duration,
    drift_window: usize,
    max_steps: Option<u64>,
}

impl LoopContext {
    fn run(self) {
        let mut pacer = Pacer::new(self.shared.rate(), self.drift_window);
        while self.shared.running.load(Ordering::Acquire) {
            if self.shared.rate_changed.swap(false, Ordering::AcqRel) {
                pacer.set_rate(self.shared.rate());
                tracing::debug!(rate = self.shared.rate(), "rate changed");
            }
            let wait = pacer.wait_time(Instant::now());
            if !wait.is_zero() {
                thread::park_timeout(wait);
                continue;
            }
            pacer.record(Instant::now());

            if let Err(e) = step_shared(&self.world, &self.strategies, &self.shared, self.lock_timeout)
            {
                tracing::error!("step aborted: {e}");
            }
            let steps = self.shared.steps.load(Ordering::Relaxed);
            if self.max_steps.is_some_and(|max| steps >= max) {
                self.shared.running.store(false, Ordering::Release);
            }
        }
        tracing::debug!(average = ?pacer.average_period(), "loop exited");
    }
}

fn step_shared(
    world: &RwLock<World>,
    strategies: &Strategies,
    shared: &Shared,
    timeout: Duration,
) -> Result<bool, StepError> {
    let Some(mut world) = try_lock_for(world, timeout) else {
        shared.skipped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("world lock busy, skipping cycle");
        return Ok(false);
    };
    match run_step(&mut world, strategies) {
        Ok(_) => {
            shared.steps.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        }
        Err(e) => {
            shared.aborted.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
    }
}

/// Poll `try_write` until `timeout` passes.
fn try_lock_for(world: &RwLock<World>, timeout: Duration) -> Option<RwLockWriteGuard<'_, World>> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        match world.try_write() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {}
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return None;
        }
        thread::sleep(Duration::from_micros(200));
    }
}
