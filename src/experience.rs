/// One interaction step: the agent saw `state`, took `action`, received
/// `reward` and landed in `next_state`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub terminal: bool,
}

impl Transition {
    pub fn new(
        state: Vec<f32>,
        action: usize,
        reward: f32,
        next_state: Vec<f32>,
        terminal: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            terminal,
        }
    }
}

/// A sampled mini-batch laid out column by column. Index `i` of every field
/// belongs to the same transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    /// Row-major `len x dimension` matrix of states.
    pub states: Vec<f32>,
    pub actions: Vec<u32>,
    pub rewards: Vec<f32>,
    /// Row-major `len x dimension` matrix of successor states.
    pub next_states: Vec<f32>,
    /// `1.0` for terminal transitions, `0.0` otherwise.
    pub terminals: Vec<f32>,
    pub dimension: usize,
}

impl Batch {
    pub fn with_capacity(len: usize, dimension: usize) -> Self {
        Self {
            states: Vec::with_capacity(len * dimension),
            actions: Vec::with_capacity(len),
            rewards: Vec::with_capacity(len),
            next_states: Vec::with_capacity(len * dimension),
            terminals: Vec::with_capacity(len),
            dimension,
        }
    }

    pub fn push(&mut self, transition: &Transition) {
        self.states.extend_from_slice(&transition.state);
        self.actions.push(transition.action as u32);
        self.rewards.push(transition.reward);
        self.next_states.extend_from_slice(&transition.next_state);
        self.terminals
            .push(if transition.terminal { 1.0 } else { 0.0 });
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn state(&self, i: usize) -> &[f32] {
        &self.states[i * self.dimension..(i + 1) * self.dimension]
    }

    pub fn next_state(&self, i: usize) -> &[f32] {
        &self.next_states[i * self.dimension..(i + 1) * self.dimension]
    }
}
