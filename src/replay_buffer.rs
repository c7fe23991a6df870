use std::collections::VecDeque;

use rand::{seq::index, Rng};

use crate::environment::Action;
use crate::error::{MixError, Result};
use crate::state::StateCode;

/// One step of experience. Never modified after it is pushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: StateCode,
    pub action: Action,
    pub reward: f32,
    pub done: bool,
    pub next_state: StateCode,
}

/// Fixed-capacity FIFO of transitions; the oldest entry is evicted first.
#[derive(Debug)]
pub struct ReplayBuffer {
    transitions: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            transitions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        if self.capacity > 0 {
            self.transitions.push_back(transition);
        }
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Draws `batch_size` distinct transitions uniformly at random.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        batch_size: usize,
    ) -> Result<Vec<&Transition>> {
        if self.transitions.len() < batch_size {
            return Err(MixError::InsufficientData {
                requested: batch_size,
                available: self.transitions.len(),
            });
        }
        let batch = index::sample(rng, self.transitions.len(), batch_size)
            .into_iter()
            .map(|i| &self.transitions[i])
            .collect();
        Ok(batch)
    }
}
