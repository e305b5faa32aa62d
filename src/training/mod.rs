//! # Training
//!
//! The episode loop and its persistence.
//!
//! Each episode moves through `Resetting → Running → Reporting`, then starts over or
//! finishes. While running, every arena that still hosts a live fight is stepped once
//! per tick; an arena drops out as soon as one of its combatants reaches zero health.
//! The target network is synchronized and checkpoints are written on an episode
//! schedule.

pub mod checkpoint;
pub mod orchestrator;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use orchestrator::{
    EpisodeEnd, EpisodePhase, StartMode, TrainingOrchestrator, TrainingOutcome, TrainingSummary,
};
