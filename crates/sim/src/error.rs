use std::path::PathBuf;

use nestgrid_kernel::KernelError;

/// A step that was aborted. The world is left in its pre-step state.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("compute phase failed: {0}")]
    Compute(#[from] KernelError),
    #[error("compute phase panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unknown step mode {0:?}, expected \"serial\" or \"parallel\"")]
    UnknownStepMode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to spawn simulation thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("simulation is already running")]
    AlreadyRunning,
}
