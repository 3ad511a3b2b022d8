use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Widest multi-binary space we enumerate; `2^16` output units is already a
/// very wide head.
pub const MAX_MULTI_BINARY_WIDTH: usize = 16;

/// The shape of the agent's choices, fixed when the learner is built.
///
/// The learner always scores a flat index space of [`ActionSpace::count`]
/// entries. For `MultiBinary` every index is a bit pattern over `n`
/// independent toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpace {
    Discrete { n: usize },
    MultiBinary { n: usize },
}

/// An action in the form the environment consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Discrete(usize),
    MultiBinary(Vec<bool>),
}

impl ActionSpace {
    pub fn validate(&self) -> Result<()> {
        match *self {
            ActionSpace::Discrete { n: 0 } | ActionSpace::MultiBinary { n: 0 } => Err(
                Error::InvalidConfig("action space must have at least one action".into()),
            ),
            ActionSpace::MultiBinary { n } if n > MAX_MULTI_BINARY_WIDTH => {
                Err(Error::InvalidConfig(format!(
                    "multi-binary width {n} exceeds {MAX_MULTI_BINARY_WIDTH}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Number of distinct indices the value estimator scores.
    pub fn count(&self) -> usize {
        match *self {
            ActionSpace::Discrete { n } => n,
            ActionSpace::MultiBinary { n } => 1 << n,
        }
    }

    pub fn decode(&self, index: usize) -> Result<Action> {
        if index >= self.count() {
            return Err(Error::InvalidAction(format!(
                "index {index} outside {self:?}"
            )));
        }
        Ok(match *self {
            ActionSpace::Discrete { .. } => Action::Discrete(index),
            ActionSpace::MultiBinary { n } => {
                Action::MultiBinary((0..n).map(|bit| index & (1 << bit) != 0).collect())
            }
        })
    }

    pub fn encode(&self, action: &Action) -> Result<usize> {
        match (*self, action) {
            (ActionSpace::Discrete { n }, Action::Discrete(i)) if *i < n => Ok(*i),
            (ActionSpace::MultiBinary { n }, Action::MultiBinary(bits)) if bits.len() == n => {
                Ok(bits
                    .iter()
                    .enumerate()
                    .filter(|(_, on)| **on)
                    .fold(0, |acc, (bit, _)| acc | (1 << bit)))
            }
            _ => Err(Error::InvalidAction(format!(
                "{action:?} does not belong to {self:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_indices_map_to_themselves() {
        let space = ActionSpace::Discrete { n: 4 };
        assert_eq!(space.count(), 4);
        assert_eq!(space.decode(3).unwrap(), Action::Discrete(3));
        assert_eq!(space.encode(&Action::Discrete(2)).unwrap(), 2);
        assert!(space.decode(4).is_err());
        assert!(space.encode(&Action::Discrete(4)).is_err());
    }

    #[test]
    fn multi_binary_uses_bit_patterns() {
        let space = ActionSpace::MultiBinary { n: 3 };
        assert_eq!(space.count(), 8);
        assert_eq!(
            space.decode(0b101).unwrap(),
            Action::MultiBinary(vec![true, false, true])
        );
        for index in 0..space.count() {
            let action = space.decode(index).unwrap();
            assert_eq!(space.encode(&action).unwrap(), index);
        }
        assert!(space.encode(&Action::MultiBinary(vec![true])).is_err());
        assert!(space.encode(&Action::Discrete(0)).is_err());
    }

    #[test]
    fn validation_rejects_empty_and_oversized_spaces() {
        assert!(ActionSpace::Discrete { n: 0 }.validate().is_err());
        assert!(ActionSpace::MultiBinary { n: 17 }.validate().is_err());
        assert!(ActionSpace::MultiBinary { n: 5 }.validate().is_ok());
    }

    #[test]
    fn deserializes_from_tagged_json() {
        let space: ActionSpace =
            serde_json::from_str(r#"{"kind": "multi_binary", "n": 5}"#).unwrap();
        assert_eq!(space, ActionSpace::MultiBinary { n: 5 });
    }
}
