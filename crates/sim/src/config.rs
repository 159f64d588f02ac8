use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use nestgrid_common::Direction;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How one phase of a step is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepMode {
    /// On the simulation thread, one entity at a time.
    Serial,
    /// Fanned out over the worker pool.
    #[default]
    Parallel,
}

impl FromStr for StepMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "parallel" => Ok(Self::Parallel),
            _ => Err(ConfigError::UnknownStepMode(s.to_string())),
        }
    }
}

impl fmt::Display for StepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
        })
    }
}

/// Simulator settings. Every field has a default, so a YAML file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub semantic_step: StepMode,
    pub state_switch_step: StepMode,
    /// Target rate. Zero runs unpaced.
    pub steps_per_second: f64,
    /// How long the loop waits for the world write lock before skipping.
    pub lock_timeout_ms: u64,
    /// Number of recent step starts used for drift correction.
    pub drift_window: usize,
    /// Worker pool size. Zero lets rayon pick.
    pub worker_threads: usize,
    /// Overrides the world's seed when set.
    pub seed: Option<u64>,
    /// Initial heading for weak explorers created by the editor.
    pub weak_explorer_direction: Direction,
    /// Stop after this many committed steps.
    pub max_steps: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            semantic_step: StepMode::Parallel,
            state_switch_step: StepMode::Parallel,
            steps_per_second: 10.0,
            lock_timeout_ms: 5,
            drift_window: 16,
            worker_threads: 0,
            seed: None,
            weak_explorer_direction: Direction::Right,
            max_steps: None,
        }
    }
}

impl SimConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Both phases serial: no worker pool is needed.
    pub fn is_serial(&self) -> bool {
        self.semantic_step == StepMode::Serial && self.state_switch_step == StepMode::Serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = SimConfig::default();
        assert_eq!(config.semantic_step, StepMode::Parallel);
        assert_eq!(config.lock_timeout(), Duration::from_millis(5));
        assert_eq!(config.weak_explorer_direction, Direction::Right);
        assert!(config.max_steps.is_none());
        assert!(!config.is_serial());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = SimConfig::from_yaml_str(
            "semantic_step: serial\nsteps_per_second: 0\nweak_explorer_direction: UP\n",
        )
        .unwrap();
        assert_eq!(config.semantic_step, StepMode::Serial);
        assert_eq!(config.state_switch_step, StepMode::Parallel);
        assert_eq!(config.steps_per_second, 0.0);
        assert_eq!(config.weak_explorer_direction, Direction::Up);
        assert_eq!(config.drift_window, 16);
    }

    #[test]
    fn yaml_round_trip() {
        let config = SimConfig {
            seed: Some(99),
            max_steps: Some(10),
            ..SimConfig::default()
        };
        let text = config.to_yaml().unwrap();
        assert_eq!(SimConfig::from_yaml_str(&text).unwrap(), config);
    }

    #[test]
    fn reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "state_switch_step: serial\nsemantic_step: serial").unwrap();
        let config = SimConfig::from_yaml_file(file.path()).unwrap();
        assert!(config.is_serial());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = SimConfig::from_yaml_file("/nonexistent/nestgrid.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/nestgrid.yaml"));
    }

    #[test]
    fn bad_yaml_is_rejected() {
        assert!(SimConfig::from_yaml_str("semantic_step: sideways").is_err());
    }

    #[test]
    fn step_mode_parses_case_insensitively() {
        assert_eq!("Serial".parse::<StepMode>().unwrap(), StepMode::Serial);
        assert_eq!("PARALLEL".parse::<StepMode>().unwrap(), StepMode::Parallel);
        assert!("both".parse::<StepMode>().is_err());
        assert_eq!(StepMode::Serial.to_string(), "serial");
    }
}
