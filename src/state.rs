use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which observation components are fed to the estimator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSelection {
    #[default]
    All,
    /// Keep the first `n` components.
    Leading(usize),
    /// Keep the listed components, in the listed order.
    Indices(Vec<usize>),
}

impl FeatureSelection {
    /// Width of the projected state for an observation of width `state_dim`.
    pub fn output_dim(&self, state_dim: usize) -> Result<usize> {
        let dim = match self {
            FeatureSelection::All => state_dim,
            FeatureSelection::Leading(n) => {
                if *n > state_dim {
                    return Err(Error::InvalidConfig(format!(
                        "cannot keep {n} leading features of a {state_dim}-wide state"
                    )));
                }
                *n
            }
            FeatureSelection::Indices(indices) => {
                if let Some(bad) = indices.iter().find(|i| **i >= state_dim) {
                    return Err(Error::InvalidConfig(format!(
                        "feature index {bad} out of range for a {state_dim}-wide state"
                    )));
                }
                indices.len()
            }
        };
        if dim == 0 {
            return Err(Error::InvalidConfig("feature selection keeps no features".into()));
        }
        Ok(dim)
    }

    /// Assumes `state` has already been checked against the configured width.
    pub fn project(&self, state: &[f32]) -> Vec<f32> {
        match self {
            FeatureSelection::All => state.to_vec(),
            FeatureSelection::Leading(n) => state[..*n].to_vec(),
            FeatureSelection::Indices(indices) => indices.iter().map(|i| state[*i]).collect(),
        }
    }
}
