use std::collections::{HashSet, VecDeque};

use ndarray::Array1;
use rand::Rng;

/// One recorded step. A terminal transition carries an all-zero `next_state`.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub terminal: bool,
}

impl Transition {
    /// A terminal transition whose successor is the zero vector of the state's length.
    pub fn terminal(state: Array1<f32>, action: usize, reward: f32) -> Self {
        let next_state = Array1::zeros(state.len());
        Transition {
            state,
            action,
            reward,
            next_state,
            terminal: true,
        }
    }
}

/// Bounded FIFO memory of transitions.
#[derive(Clone, Debug)]
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        ReplayMemory {
            buffer: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    /// Append a transition, evicting the oldest one once capacity is reached.
    pub fn remember(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `min(batch_size, len)` distinct transitions uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<&Transition> {
        let count = batch_size.min(self.buffer.len());
        let mut used = HashSet::with_capacity(count);
        let mut batch = Vec::with_capacity(count);
        while batch.len() < count {
            let index = rng.gen_range(0..self.buffer.len());
            if used.insert(index) {
                batch.push(&self.buffer[index]);
            }
        }
        batch
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

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
