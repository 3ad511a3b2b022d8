use std::collections::BTreeMap;

use candle_core::{Tensor, Var, backprop::GradStore};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, loss};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    action::{Action, ActionSpace},
    config::LearnerConfig,
    device::DEVICE,
    error::{Error, Result},
    experience::{Batch, Transition},
    mlp::MultiLayerPerceptron,
    replay::ExperienceStore,
    state::FeatureSelection,
};

/// Rescales every gradient in `grad_store` so that their global L2 norm is at
/// most `max_norm`. Returns the norm measured before clipping.
fn clip_gradients(grad_store: &mut GradStore, vars: &[Var], max_norm: f32) -> Result<f32> {
    let mut total_norm_sq = 0.0f32;
    let mut grads = Vec::with_capacity(vars.len());

    for var in vars {
        let tensor = var.as_tensor();
        if let Some(grad) = grad_store.get(tensor) {
            total_norm_sq += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
            grads.push((tensor, grad.clone()));
        }
    }

    let total_norm = total_norm_sq.sqrt();
    if total_norm > max_norm {
        let scale = f64::from(max_norm / total_norm);
        for (tensor, grad) in grads {
            grad_store.insert(tensor, grad.affine(scale, 0.0)?);
        }
    }
    Ok(total_norm)
}

/// What a call to [`Learner::train`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainOutcome {
    /// Not enough experience for a batch yet; nothing changed.
    Skipped,
    /// One gradient step was taken with this batch loss.
    Updated { loss: f32 },
}

/// DQN learner: an online estimator trained on replayed experience and a
/// target estimator that provides the bootstrapped regression targets.
pub struct Learner {
    online: MultiLayerPerceptron,
    target: MultiLayerPerceptron,
    optimiser: AdamW,
    store: ExperienceStore,
    action_space: ActionSpace,
    state_dim: usize,
    features: FeatureSelection,
    batch_size: usize,
    gamma: f32,
    epsilon: f32,
    target_sync_interval: usize,
    max_grad_norm: Option<f32>,
    updates: usize,
    rng: StdRng,
}

impl Learner {
    pub fn new(state_dim: usize, action_space: ActionSpace, config: LearnerConfig) -> Result<Self> {
        config.validate()?;
        action_space.validate()?;
        let input_dim = config.features.output_dim(state_dim)?;

        let mut topology = Vec::with_capacity(config.hidden_layers.len() + 2);
        topology.push(input_dim);
        topology.extend_from_slice(&config.hidden_layers);
        topology.push(action_space.count());

        let online = MultiLayerPerceptron::new(&topology)?;
        let target = MultiLayerPerceptron::new(&topology)?;
        target.copy_from(&online)?;

        // Adam is AdamW without decay.
        let optimiser = AdamW::new(
            online.vars(),
            ParamsAdamW {
                lr: config.learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        let (store, rng) = match config.seed {
            Some(seed) => (
                ExperienceStore::seeded(config.capacity, seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (ExperienceStore::new(config.capacity), StdRng::from_os_rng()),
        };

        tracing::debug!(?topology, ?action_space, "built learner");

        Ok(Self {
            online,
            target,
            optimiser,
            store: store.with_dimension(input_dim),
            action_space,
            state_dim,
            features: config.features,
            batch_size: config.batch_size,
            gamma: config.gamma,
            epsilon: config.initial_epsilon,
            target_sync_interval: config.target_sync_interval,
            max_grad_norm: config.max_grad_norm,
            updates: 0,
            rng,
        })
    }

    /// Discrete learner with the default hyper-parameters.
    pub fn discrete(state_dim: usize, action_count: usize) -> Result<Self> {
        Self::new(
            state_dim,
            ActionSpace::Discrete { n: action_count },
            LearnerConfig::default(),
        )
    }

    fn check_state(&self, state: &[f32]) -> Result<()> {
        if state.len() != self.state_dim {
            return Err(Error::DimensionMismatch {
                expected: self.state_dim,
                found: state.len(),
            });
        }
        Ok(())
    }

    /// Estimated value of every action index in `state`.
    pub fn q_values(&self, state: &[f32]) -> Result<Vec<f32>> {
        self.check_state(state)?;
        let features = self.features.project(state);
        let len = features.len();
        let input = Tensor::from_vec(features, (1, len), &DEVICE)?;
        Ok(self.online.output(&input)?.squeeze(0)?.to_vec1::<f32>()?)
    }

    /// Index of the highest estimate; the first one wins ties.
    pub fn greedy_action(&self, state: &[f32]) -> Result<usize> {
        let values = self.q_values(state)?;
        let mut best = 0;
        for (i, value) in values.iter().enumerate().skip(1) {
            if *value > values[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// ε-greedy choice over `[0, action_count)`.
    pub fn select_action(&mut self, state: &[f32]) -> Result<usize> {
        self.check_state(state)?;
        if self.rng.random::<f32>() < self.epsilon {
            return Ok(self.rng.random_range(0..self.action_space.count()));
        }
        self.greedy_action(state)
    }

    /// [`Learner::select_action`] decoded into the environment's action form.
    pub fn act(&mut self, state: &[f32]) -> Result<Action> {
        let index = self.select_action(state)?;
        self.action_space.decode(index)
    }

    pub fn store_transition(
        &mut self,
        state: &[f32],
        action: usize,
        reward: f32,
        next_state: &[f32],
        done: bool,
    ) -> Result<()> {
        self.check_state(state)?;
        self.check_state(next_state)?;
        if action >= self.action_space.count() {
            return Err(Error::InvalidAction(format!(
                "index {action} outside {:?}",
                self.action_space
            )));
        }
        self.store.push(Transition::new(
            self.features.project(state),
            action,
            reward,
            self.features.project(next_state),
            done,
        ))
    }

    /// `reward + gamma * max_a Q_target(next_state, a) * (1 - terminal)` per
    /// transition, as an `n x 1` column.
    fn target_values(&self, batch: &Batch) -> Result<Tensor> {
        let (n, d) = (batch.len(), batch.dimension);
        let next_states = Tensor::from_slice(&batch.next_states, (n, d), &DEVICE)?;
        let rewards = Tensor::from_slice(&batch.rewards, (n, 1), &DEVICE)?;
        let terminals = Tensor::from_slice(&batch.terminals, (n, 1), &DEVICE)?;

        let max_next = self.target.output(&next_states)?.max_keepdim(1)?.detach();
        let bootstrap = max_next
            .affine(f64::from(self.gamma), 0.0)?
            .mul(&terminals.affine(-1.0, 1.0)?)?;
        Ok(rewards.add(&bootstrap)?)
    }

    /// Regression targets the next update would use for `batch`.
    pub fn td_targets(&self, batch: &Batch) -> Result<Vec<f32>> {
        Ok(self.target_values(batch)?.flatten_all()?.to_vec1::<f32>()?)
    }

    /// One replayed gradient step, then a target sync when due.
    pub fn train(&mut self) -> Result<TrainOutcome> {
        let Some(batch) = self.store.try_sample(self.batch_size) else {
            return Ok(TrainOutcome::Skipped);
        };

        let (n, d) = (batch.len(), batch.dimension);
        let states = Tensor::from_slice(&batch.states, (n, d), &DEVICE)?;
        let actions = Tensor::from_slice(&batch.actions, (n, 1), &DEVICE)?;

        let predicted = self.online.output(&states)?.gather(&actions, 1)?;
        let targets = self.target_values(&batch)?;
        let loss = loss::mse(&predicted, &targets)?;

        let mut grads = loss.backward()?;
        if let Some(max_norm) = self.max_grad_norm {
            let norm = clip_gradients(&mut grads, &self.online.vars(), max_norm)?;
            tracing::trace!(norm, "gradient norm");
        }
        self.optimiser.step(&grads)?;
        self.updates += 1;

        if self.updates % self.target_sync_interval == 0 {
            self.target.copy_from(&self.online)?;
        }

        let loss = loss.to_scalar::<f32>()?;
        tracing::debug!(update = self.updates, loss, "trained on replay batch");
        Ok(TrainOutcome::Updated { loss })
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Clamped into `[0, 1]`. NaN is ignored and the current rate kept.
    pub fn set_epsilon(&mut self, epsilon: f32) {
        if epsilon.is_nan() {
            tracing::warn!(current = self.epsilon, "ignoring NaN exploration rate");
            return;
        }
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn action_space(&self) -> ActionSpace {
        self.action_space
    }

    pub fn action_count(&self) -> usize {
        self.action_space.count()
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    /// Gradient steps taken so far.
    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn store(&self) -> &ExperienceStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ExperienceStore {
        &mut self.store
    }

    pub fn online_parameters(&self) -> Result<BTreeMap<String, Vec<f32>>> {
        self.online.parameters()
    }

    pub fn target_parameters(&self) -> Result<BTreeMap<String, Vec<f32>>> {
        self.target.parameters()
    }
}
