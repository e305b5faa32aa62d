use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::action::Action;
use super::state::{self, StateVector, STATE_SIZE};
use crate::config::AgentConfig;
use crate::error::{DuelistError, Result};
use crate::network::QNetwork;
use crate::replay_buffer::{ReplayMemory, Transition};
use crate::world::EntityState;

/// Number of discrete actions.
pub const ACTION_SIZE: usize = Action::ALL.len();

/// DQN agent shared by every combatant.
///
/// The agent owns an online network that is trained on every [`Agent::learn`] call and
/// a target network that only changes through [`Agent::update_target_network`].
///
/// # Example
///
/// ```rust
/// use duelist::agent::{Agent, ACTION_SIZE, STATE_SIZE};
/// use duelist::config::AgentConfig;
/// use ndarray::Array1;
///
/// let mut agent = Agent::with_seed(&AgentConfig::default(), 7).unwrap();
/// agent.set_epsilon(0.0);
///
/// let state = Array1::from_elem(STATE_SIZE, 0.5);
/// let action = agent.select_action(state.view()).unwrap();
/// assert!(action < ACTION_SIZE);
///
/// // Nothing to learn from yet
/// assert!(agent.learn().unwrap().is_none());
/// ```
pub struct Agent {
    q_network: QNetwork,
    target_network: QNetwork,
    memory: ReplayMemory,
    epsilon: f32,
    config: AgentConfig,
    rng: StdRng,
}

impl Agent {
    /// Create a fresh agent seeded from system entropy.
    pub fn new(config: &AgentConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a fresh agent with a reproducible seed.
    pub fn with_seed(config: &AgentConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &AgentConfig, mut rng: StdRng) -> Result<Self> {
        let q_network = QNetwork::new(STATE_SIZE, ACTION_SIZE, &mut rng)?;
        let target_network = q_network.clone();
        Ok(Agent {
            q_network,
            target_network,
            memory: ReplayMemory::new(config.memory_capacity),
            epsilon: config.epsilon_start,
            config: config.clone(),
            rng,
        })
    }

    /// Restore an agent from a snapshot. The memory starts empty.
    pub fn from_snapshot(snapshot: AgentSnapshot, config: &AgentConfig) -> Result<Self> {
        snapshot.validate()?;
        Ok(Agent {
            q_network: snapshot.q_network,
            target_network: snapshot.target_network,
            memory: ReplayMemory::new(config.memory_capacity),
            epsilon: snapshot.epsilon,
            config: config.clone(),
            rng: StdRng::from_entropy(),
        })
    }

    /// Reseed exploration and sampling, e.g. after restoring from a snapshot.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            q_network: self.q_network.clone(),
            target_network: self.target_network.clone(),
            epsilon: self.epsilon,
            state_size: STATE_SIZE,
            action_size: ACTION_SIZE,
            actions: Action::catalog(),
        }
    }

    pub fn encode_state(
        &self,
        own: Option<&EntityState>,
        opponent: Option<&EntityState>,
        previous_distance: Option<f32>,
        opponent_reported_health: f32,
    ) -> StateVector {
        state::encode_state(own, opponent, previous_distance, opponent_reported_health)
    }

    /// Select an action index using the epsilon-greedy policy.
    pub fn select_action(&mut self, state: ArrayView1<f32>) -> Result<usize> {
        if self.rng.gen::<f32>() < self.epsilon {
            return Ok(self.rng.gen_range(0..ACTION_SIZE));
        }
        let q_values = self.q_network.forward(state)?;
        Ok(argmax(q_values.view()))
    }

    /// Store a transition after checking its shape.
    pub fn remember(&mut self, transition: Transition) -> Result<()> {
        if transition.state.len() != STATE_SIZE || transition.next_state.len() != STATE_SIZE {
            return Err(DuelistError::dimension_mismatch(
                format!("state vectors of length {}", STATE_SIZE),
                format!("{} and {}", transition.state.len(), transition.next_state.len()),
            ));
        }
        if transition.action >= ACTION_SIZE {
            return Err(DuelistError::InvalidAction {
                action: transition.action,
                max_actions: ACTION_SIZE,
            });
        }
        self.memory.remember(transition);
        Ok(())
    }

    /// Train the online network on one sampled batch, then decay epsilon.
    ///
    /// Returns the mean absolute TD error of the batch, or `None` while the memory
    /// holds fewer than `min_memory_size` transitions.
    pub fn learn(&mut self) -> Result<Option<f32>> {
        if self.memory.is_empty() || self.memory.len() < self.config.min_memory_size {
            return Ok(None);
        }

        let batch = self.memory.sample(self.config.batch_size, &mut self.rng);
        let batch_len = batch.len();
        let mut total_error = 0.0;
        for transition in batch {
            let mut target = transition.reward;
            if !transition.terminal {
                let next_q = self.target_network.forward(transition.next_state.view())?;
                let max_next = next_q.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                target += self.config.discount_factor * max_next;
            }
            let predicted = self.q_network.update(
                transition.state.view(),
                transition.action,
                target,
                self.config.learning_rate,
            )?;
            total_error += (predicted - target).abs();
        }

        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        Ok(Some(total_error / batch_len as f32))
    }

    /// Replace the target network with a copy of the online network.
    pub fn update_target_network(&mut self) {
        self.target_network = self.q_network.clone();
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn q_network(&self) -> &QNetwork {
        &self.q_network
    }

    pub fn target_network(&self) -> &QNetwork {
        &self.target_network
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Index of the largest value; the first one wins ties.
fn argmax(values: ArrayView1<f32>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Everything needed to resume training or run inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub q_network: QNetwork,
    pub target_network: QNetwork,
    pub epsilon: f32,
    pub state_size: usize,
    pub action_size: usize,
    pub actions: Vec<String>,
}

impl AgentSnapshot {
    pub fn validate(&self) -> Result<()> {
        if self.state_size != STATE_SIZE || self.action_size != ACTION_SIZE {
            return Err(DuelistError::InvalidCheckpoint(format!(
                "snapshot describes {} states and {} actions, expected {} and {}",
                self.state_size, self.action_size, STATE_SIZE, ACTION_SIZE
            )));
        }
        if self.actions != Action::catalog() {
            return Err(DuelistError::InvalidCheckpoint(format!(
                "unknown action catalog {:?}",
                self.actions
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(DuelistError::InvalidCheckpoint(format!(
                "epsilon {} outside [0, 1]",
                self.epsilon
            )));
        }
        for network in [&self.q_network, &self.target_network] {
            network.validate()?;
            if network.state_size() != STATE_SIZE || network.action_size() != ACTION_SIZE {
                return Err(DuelistError::dimension_mismatch(
                    format!("{}x{} network", STATE_SIZE, ACTION_SIZE),
                    format!("{}x{}", network.state_size(), network.action_size()),
                ));
            }
        }
        Ok(())
    }
}
