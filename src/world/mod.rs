//! # World Interface
//!
//! The actuator/sensor boundary between the training core and the game world. A
//! [`World`] hosts actors, executes their commands and reports what happened through
//! [`WorldEvent`]s. The core never sleeps on its own: every settle delay is requested
//! through [`World::settle`], and timed control pulses carry their duration with the
//! command.
//!
//! [`SimWorld`] is an in-process implementation used by the binary and the tests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

mod sim;
pub use sim::SimWorld;

/// Full health (and food) of a freshly spawned actor.
pub const MAX_HEALTH: f32 = 20.0;

/// Height of an actor's bounding box.
pub const ENTITY_HEIGHT: f32 = 1.8;

/// Handle to an actor hosted by a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }

    pub fn offset(self, dx: f32, dy: f32, dz: f32) -> Vec3 {
        Vec3::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let (dx, dy, dz) = (other.x - self.x, other.y - self.y, other.z - self.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance in the horizontal x/z plane.
    pub fn planar_distance(self, other: Vec3) -> f32 {
        let (dx, dz) = (other.x - self.x, other.z - self.z);
        (dx * dx + dz * dz).sqrt()
    }
}

/// What a world reports about one actor.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub position: Vec3,
    /// Blocks per world tick.
    pub velocity: Vec3,
    /// Heading in radians; facing `(cos yaw, sin yaw)` in the x/z plane.
    pub yaw: f32,
    pub health: f32,
    pub food: f32,
    pub sprinting: bool,
    pub alive: bool,
}

/// A movement control that can be held for a timed pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Forward,
    Back,
    Left,
    Right,
    Jump,
    Sprint,
}

/// Notifications delivered by [`World::poll_events`], in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    HealthChanged { actor: ActorId, health: f32 },
    Died { actor: ActorId },
    Spawned { actor: ActorId },
}

/// The world collaborator consumed by combatants and the orchestrator.
pub trait World {
    /// Join an actor under `name`. Failure is fatal to that actor's participation.
    fn connect(&mut self, name: &str) -> Result<ActorId>;

    fn disconnect(&mut self, actor: ActorId) -> Result<()>;

    /// Current state of an actor, or `None` if it has no presence in the world.
    fn observe(&self, actor: ActorId) -> Option<EntityState>;

    /// Hold `controls` for `duration_ms`, then release them.
    fn issue_movement(&mut self, actor: ActorId, controls: &[Control], duration_ms: u64) -> Result<()>;

    fn issue_attack(&mut self, actor: ActorId, target: ActorId) -> Result<()>;

    fn issue_look(&mut self, actor: ActorId, target: Vec3) -> Result<()>;

    fn teleport(&mut self, actor: ActorId, position: Vec3) -> Result<()>;

    /// Build a walled square arena of half-width `size` with its floor under `center`.
    fn build_arena(&mut self, center: Vec3, size: f32) -> Result<()>;

    fn heal_and_equip(&mut self, actor: ActorId) -> Result<()>;

    /// Let `duration_ms` of world time pass so issued commands take effect.
    fn settle(&mut self, duration_ms: u64);

    /// World clock in milliseconds.
    fn now_ms(&self) -> u64;

    /// Drain the events that happened since the last call.
    fn poll_events(&mut self) -> Vec<WorldEvent>;
}
