//! # Agent Module
//!
//! The shared learner behind every combatant.
//!
//! ## Core Concepts
//!
//! - **State encoding**: a raw observation of two entities becomes a fixed
//!   [`STATE_SIZE`]-length vector of normalized features
//! - **Epsilon-greedy**: act randomly with probability `epsilon`, otherwise greedily by
//!   predicted value
//! - **Experience Replay**: transitions are collected from every arena into one
//!   [`ReplayMemory`](crate::replay_buffer::ReplayMemory) and sampled in batches
//! - **Target network**: a frozen copy of the online network used for TD targets,
//!   refreshed on the orchestrator's schedule
//!
//! Exploration decays once per successful `learn()` call, so the caller controls the
//! decay cadence through how often it learns.

mod action;
mod dqn;
mod state;

pub use action::Action;
pub use dqn::{Agent, AgentSnapshot, ACTION_SIZE};
pub use state::{encode_state, StateVector, STATE_SIZE};
