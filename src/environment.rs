use std::{thread, time::Duration};

use crate::{
    action::{Action, ActionSpace},
    error::{Error, Result},
};

/// Outcome of applying one action.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<I> {
    pub next_state: Vec<f32>,
    pub reward: f32,
    pub done: bool,
    /// Environment-specific extras; the learner never looks at this.
    pub info: I,
}

/// The world the agent explores, seen only through episode resets and
/// action steps.
pub trait Environment {
    type Info;

    /// Starts an episode and returns the first observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    fn step(&mut self, action: &Action) -> Result<Step<Self::Info>>;

    fn state_dim(&self) -> usize;

    fn action_space(&self) -> ActionSpace;
}

/// Calls [`Environment::reset`] up to `attempts` times, doubling the pause
/// between failures starting from `backoff`.
pub fn reset_with_retry<E: Environment>(
    env: &mut E,
    attempts: usize,
    backoff: Duration,
) -> Result<Vec<f32>> {
    let mut delay = backoff;
    let mut last_error = None;
    for attempt in 1..=attempts.max(1) {
        match env.reset() {
            Ok(state) => return Ok(state),
            Err(err) => {
                tracing::warn!(attempt, %err, "episode start failed");
                last_error = Some(err);
                if attempt < attempts {
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::Environment("reset never attempted".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails the first `failures` resets.
    struct Flaky {
        failures: usize,
        resets: usize,
    }

    impl Environment for Flaky {
        type Info = ();

        fn reset(&mut self) -> Result<Vec<f32>> {
            self.resets += 1;
            if self.resets <= self.failures {
                return Err(Error::Environment("mission not ready".into()));
            }
            Ok(vec![0.0, 0.0])
        }

        fn step(&mut self, _action: &Action) -> Result<Step<()>> {
            Ok(Step {
                next_state: vec![0.0, 0.0],
                reward: 0.0,
                done: true,
                info: (),
            })
        }

        fn state_dim(&self) -> usize {
            2
        }

        fn action_space(&self) -> ActionSpace {
            ActionSpace::Discrete { n: 1 }
        }
    }

    #[test]
    fn retries_until_reset_succeeds() {
        let mut env = Flaky {
            failures: 2,
            resets: 0,
        };
        let state = reset_with_retry(&mut env, 3, Duration::from_millis(1)).unwrap();
        assert_eq!(state, vec![0.0, 0.0]);
        assert_eq!(env.resets, 3);
    }

    #[test]
    fn gives_up_after_last_attempt() {
        let mut env = Flaky {
            failures: 5,
            resets: 0,
        };
        let err = reset_with_retry(&mut env, 2, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, Error::Environment(_)));
        assert_eq!(env.resets, 2);
    }
}
