use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    state::FeatureSelection,
    world::WorldConfig,
};

/// Hyper-parameters of the value learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Experience store capacity.
    pub capacity: usize,
    pub batch_size: usize,
    /// Discount factor, in `(0, 1]`.
    pub gamma: f32,
    pub initial_epsilon: f32,
    pub learning_rate: f64,
    pub hidden_layers: Vec<usize>,
    /// Copy online weights into the target network every this many updates.
    /// `1` syncs after every update.
    pub target_sync_interval: usize,
    pub features: FeatureSelection,
    /// Clip the global gradient norm to this value before each step.
    pub max_grad_norm: Option<f32>,
    pub seed: Option<u64>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            batch_size: 32,
            gamma: 0.99,
            initial_epsilon: 1.0,
            learning_rate: 1e-3,
            hidden_layers: vec![64],
            target_sync_interval: 1,
            features: FeatureSelection::All,
            max_grad_norm: None,
            seed: None,
        }
    }
}

impl LearnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        if self.capacity < self.batch_size {
            return Err(Error::InvalidConfig(format!(
                "capacity {} cannot hold a batch of {}",
                self.capacity, self.batch_size
            )));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "gamma {} outside (0, 1]",
                self.gamma
            )));
        }
        if !(0.0..=1.0).contains(&self.initial_epsilon) {
            return Err(Error::InvalidConfig(format!(
                "initial_epsilon {} outside [0, 1]",
                self.initial_epsilon
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig("learning_rate must be positive".into()));
        }
        if self.target_sync_interval == 0 {
            return Err(Error::InvalidConfig(
                "target_sync_interval must be at least 1".into(),
            ));
        }
        if matches!(self.max_grad_norm, Some(norm) if !(norm > 0.0)) {
            return Err(Error::InvalidConfig("max_grad_norm must be positive".into()));
        }
        Ok(())
    }
}

/// How the driver moves the exploration rate between episodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpsilonSchedule {
    /// Leave the learner's rate where it is.
    Fixed,
    /// `end + (start - end) * exp(-step / decay)`, `step` counted in
    /// environment steps.
    Exponential { start: f32, end: f32, decay: f32 },
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        EpsilonSchedule::Exponential {
            start: 1.0,
            end: 0.05,
            decay: 500.0,
        }
    }
}

impl EpsilonSchedule {
    pub fn value(&self, step: usize) -> Option<f32> {
        match *self {
            EpsilonSchedule::Fixed => None,
            EpsilonSchedule::Exponential { start, end, decay } => {
                Some(end + (start - end) * (-(step as f32) / decay).exp())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let EpsilonSchedule::Exponential { start, end, decay } = *self {
            for (name, value) in [("start", start), ("end", end)] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(Error::InvalidConfig(format!(
                        "epsilon schedule {name} {value} outside [0, 1]"
                    )));
                }
            }
            if !(decay > 0.0 && decay.is_finite()) {
                return Err(Error::InvalidConfig(format!(
                    "epsilon schedule decay {decay} must be positive"
                )));
            }
        }
        Ok(())
    }
}

/// Top-level configuration of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub learner: LearnerConfig,
    pub world: WorldConfig,
    pub episodes: usize,
    pub max_steps: usize,
    pub epsilon_schedule: EpsilonSchedule,
    pub metrics_path: Option<PathBuf>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            learner: LearnerConfig {
                features: FeatureSelection::Leading(3),
                ..LearnerConfig::default()
            },
            world: WorldConfig::default(),
            episodes: 30,
            max_steps: 50,
            epsilon_schedule: EpsilonSchedule::default(),
            metrics_path: None,
        }
    }
}

impl ExplorerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Parses and validates a run configuration. A `learner` object without
    /// `features` keeps the run default rather than the bare learner default.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        let features_given = raw
            .get("learner")
            .is_some_and(|learner| learner.get("features").is_some());

        let mut config: ExplorerConfig = serde_json::from_value(raw)?;
        if !features_given {
            config.learner.features = ExplorerConfig::default().learner.features;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.learner.validate()?;
        self.epsilon_schedule.validate()
    }
}
