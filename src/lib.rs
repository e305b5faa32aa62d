//! # Duelist - Reinforcement Learning for Arena Duels
//!
//! Duelist trains agents to fight each other one-on-one. Many duels run side by side in
//! separate arenas, all feeding one shared DQN agent: a small hand-rolled Q-network,
//! experience replay, an epsilon-greedy policy and a periodically synced target
//! network. Training progress is checkpointed to JSON and can be resumed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelist::config::Config;
//! use duelist::training::{StartMode, TrainingOrchestrator};
//! use duelist::world::SimWorld;
//!
//! let config = Config::default();
//! let world = SimWorld::new(Some(42));
//! let mut orchestrator = TrainingOrchestrator::new(config, world, StartMode::Fresh)?;
//! let outcome = orchestrator.train()?;
//! orchestrator.shutdown();
//! # Ok::<(), duelist::error::DuelistError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - State encoding, action catalog and the shared DQN agent
//! - [`combatant`] - Per-actor controller: actions to commands, rewards, terminal transitions
//! - [`config`] - TOML configuration
//! - [`error`] - Error types and result handling
//! - [`metrics`] - Bounded episode history and reporting queries
//! - [`network`] - The fixed-topology Q-network
//! - [`replay_buffer`] - Transitions and the bounded replay memory
//! - [`training`] - Episode orchestration and checkpoints
//! - [`world`] - The world interface and the built-in arena simulator

pub mod agent;
pub mod combatant;
pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod replay_buffer;
pub mod training;
pub mod world;

#[cfg(test)]
mod tests;
