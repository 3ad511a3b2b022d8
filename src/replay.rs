use std::collections::VecDeque;

use rand::{SeedableRng, rngs::StdRng, seq::index};

use crate::{
    error::{Error, Result},
    experience::{Batch, Transition},
};

/// Bounded FIFO store of transitions with uniform sampling without
/// replacement.
///
/// The dimensionality of stored states is fixed by the first push (or up
/// front with [`ExperienceStore::with_dimension`]); later transitions of a
/// different width are rejected.
pub struct ExperienceStore {
    buffer: VecDeque<Transition>,
    capacity: usize,
    dimension: Option<usize>,
    rng: StdRng,
}

impl ExperienceStore {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_os_rng())
    }

    pub fn seeded(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            dimension: None,
            rng,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn push(&mut self, transition: Transition) -> Result<()> {
        let expected = self.dimension.unwrap_or(transition.state.len());
        for found in [transition.state.len(), transition.next_state.len()] {
            if found != expected {
                return Err(Error::DimensionMismatch { expected, found });
            }
        }
        self.dimension = Some(expected);

        if self.capacity == 0 {
            return Ok(());
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
        Ok(())
    }

    pub fn sample(&mut self, batch_size: usize) -> Result<Batch> {
        let available = self.buffer.len();
        if batch_size > available {
            return Err(Error::InsufficientData {
                requested: batch_size,
                available,
            });
        }

        let mut batch = Batch::with_capacity(batch_size, self.dimension.unwrap_or(0));
        for i in index::sample(&mut self.rng, available, batch_size) {
            batch.push(&self.buffer[i]);
        }
        Ok(batch)
    }

    /// Size check and sampling in one step; `None` while fewer than
    /// `batch_size` transitions are stored.
    pub fn try_sample(&mut self, batch_size: usize) -> Option<Batch> {
        if self.buffer.len() < batch_size {
            return None;
        }
        self.sample(batch_size).ok()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}
