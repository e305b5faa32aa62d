use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{ActorId, Control, EntityState, Vec3, World, WorldEvent, MAX_HEALTH};
use crate::error::{DuelistError, Result};

// Physics step
const TICK_MS: u64 = 50;
const WALK_SPEED: f32 = 4.3; // blocks per second
const SPRINT_MULTIPLIER: f32 = 1.3;
const JUMP_VELOCITY: f32 = 8.0;
const GRAVITY: f32 = 32.0;
const WALL_MARGIN: f32 = 0.3;

// Melee
const ATTACK_REACH: f32 = 3.5;
const SWORD_DAMAGE: f32 = 7.0;
const FIST_DAMAGE: f32 = 1.0;
const ARMOR_FACTOR: f32 = 0.6;
const HURT_COOLDOWN_MS: u64 = 500;
const KNOCKBACK: f32 = 0.4;

const WORLD_SPAWN: Vec3 = Vec3::new(0.0, 64.0, 0.0);

#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f32,
    max_x: f32,
    min_z: f32,
    max_z: f32,
    floor_y: f32,
}

impl Bounds {
    fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.z >= self.min_z && p.z <= self.max_z
    }

    fn clamp(&self, p: &mut Vec3) {
        p.x = p.x.clamp(self.min_x + WALL_MARGIN, self.max_x - WALL_MARGIN);
        p.z = p.z.clamp(self.min_z + WALL_MARGIN, self.max_z - WALL_MARGIN);
    }
}

#[derive(Debug)]
struct SimActor {
    name: String,
    position: Vec3,
    velocity: Vec3,
    yaw: f32,
    health: f32,
    food: f32,
    alive: bool,
    equipped: bool,
    /// Held controls and the world time at which each is released.
    controls: Vec<(Control, u64)>,
    last_hurt_ms: Option<u64>,
    bounds: Option<Bounds>,
}

impl SimActor {
    fn spawn(name: &str) -> Self {
        SimActor {
            name: name.to_string(),
            position: WORLD_SPAWN,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            health: MAX_HEALTH,
            food: MAX_HEALTH,
            alive: true,
            equipped: false,
            controls: Vec::new(),
            last_hurt_ms: None,
            bounds: None,
        }
    }

    fn holds(&self, control: Control) -> bool {
        self.controls.iter().any(|&(c, _)| c == control)
    }

    fn floor_y(&self) -> f32 {
        self.bounds.map(|b| b.floor_y).unwrap_or(WORLD_SPAWN.y)
    }

    fn integrate(&mut self, dt: f32) {
        let axis = |pos: bool, neg: bool| (pos as i8 - neg as i8) as f32;
        let forward = axis(self.holds(Control::Forward), self.holds(Control::Back));
        let strafe = axis(self.holds(Control::Right), self.holds(Control::Left));

        let (sin, cos) = self.yaw.sin_cos();
        let mut dx = forward * cos - strafe * sin;
        let mut dz = forward * sin + strafe * cos;
        let norm = (dx * dx + dz * dz).sqrt();
        if norm > 0.0 {
            dx /= norm;
            dz /= norm;
        }

        let speed = if self.holds(Control::Sprint) {
            WALK_SPEED * SPRINT_MULTIPLIER
        } else {
            WALK_SPEED
        };
        self.velocity.x = dx * speed;
        self.velocity.z = dz * speed;

        let floor = self.floor_y();
        let grounded = self.position.y <= floor;
        if grounded && self.holds(Control::Jump) {
            self.velocity.y = JUMP_VELOCITY;
        }
        self.velocity.y -= GRAVITY * dt;

        self.position.x += self.velocity.x * dt;
        self.position.y += self.velocity.y * dt;
        self.position.z += self.velocity.z * dt;
        if self.position.y <= floor {
            self.position.y = floor;
            self.velocity.y = 0.0;
        }
        if let Some(bounds) = self.bounds {
            bounds.clamp(&mut self.position);
        }
    }

    fn state(&self) -> EntityState {
        let per_tick = TICK_MS as f32 / 1000.0;
        EntityState {
            position: self.position,
            velocity: Vec3::new(
                self.velocity.x * per_tick,
                self.velocity.y * per_tick,
                self.velocity.z * per_tick,
            ),
            yaw: self.yaw,
            health: self.health,
            food: self.food,
            sprinting: self.holds(Control::Sprint),
            alive: self.alive,
        }
    }
}

/// A small kinematic arena simulator.
///
/// Actors walk at a fixed speed relative to their heading, can jump and sprint, are kept
/// inside the walls of the arena they were teleported into, and trade melee hits with a
/// short hurt-invulnerability window. A dead actor stays down until it is teleported,
/// which respawns it at full health.
pub struct SimWorld {
    actors: BTreeMap<ActorId, SimActor>,
    arenas: Vec<Bounds>,
    rejected: HashSet<String>,
    events: Vec<WorldEvent>,
    clock_ms: u64,
    next_id: u32,
    rng: StdRng,
}

impl SimWorld {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        SimWorld {
            actors: BTreeMap::new(),
            arenas: Vec::new(),
            rejected: HashSet::new(),
            events: Vec::new(),
            clock_ms: 0,
            next_id: 1,
            rng,
        }
    }

    /// Refuse future connections under `name`.
    pub fn reject_connections(&mut self, name: &str) {
        self.rejected.insert(name.to_string());
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    /// Environmental damage, bypassing reach and hurt cooldown.
    pub fn inflict(&mut self, actor: ActorId, damage: f32) -> Result<()> {
        let clock = self.clock_ms;
        let target = self.actors.get_mut(&actor).ok_or(DuelistError::UnknownActor(actor))?;
        if target.alive {
            Self::apply_damage(target, actor, damage, clock, &mut self.events);
        }
        Ok(())
    }

    fn actor(&self, actor: ActorId) -> Result<&SimActor> {
        self.actors.get(&actor).ok_or(DuelistError::UnknownActor(actor))
    }

    fn actor_mut(&mut self, actor: ActorId) -> Result<&mut SimActor> {
        self.actors.get_mut(&actor).ok_or(DuelistError::UnknownActor(actor))
    }

    fn apply_damage(
        target: &mut SimActor,
        id: ActorId,
        damage: f32,
        clock: u64,
        events: &mut Vec<WorldEvent>,
    ) {
        target.health = (target.health - damage).max(0.0);
        target.last_hurt_ms = Some(clock);
        events.push(WorldEvent::HealthChanged { actor: id, health: target.health });
        if target.health <= 0.0 {
            target.alive = false;
            target.controls.clear();
            target.velocity = Vec3::ZERO;
            debug!(actor = %target.name, "actor died");
            events.push(WorldEvent::Died { actor: id });
        }
    }

    fn tick(&mut self, dt_ms: u64) {
        self.clock_ms += dt_ms;
        let clock = self.clock_ms;
        let dt = dt_ms as f32 / 1000.0;
        for actor in self.actors.values_mut().filter(|a| a.alive) {
            actor.integrate(dt);
            actor.controls.retain(|&(_, release)| release > clock);
        }
    }
}

impl World for SimWorld {
    fn connect(&mut self, name: &str) -> Result<ActorId> {
        if self.rejected.contains(name) {
            return Err(DuelistError::connection(name, "rejected by server"));
        }
        if self.actors.values().any(|a| a.name == name) {
            return Err(DuelistError::connection(name, "name already in use"));
        }
        let id = ActorId(self.next_id);
        self.next_id += 1;
        self.actors.insert(id, SimActor::spawn(name));
        self.events.push(WorldEvent::Spawned { actor: id });
        Ok(id)
    }

    fn disconnect(&mut self, actor: ActorId) -> Result<()> {
        self.actors
            .remove(&actor)
            .map(|_| ())
            .ok_or(DuelistError::UnknownActor(actor))
    }

    fn observe(&self, actor: ActorId) -> Option<EntityState> {
        self.actors.get(&actor).map(SimActor::state)
    }

    fn issue_movement(&mut self, actor: ActorId, controls: &[Control], duration_ms: u64) -> Result<()> {
        let release = self.clock_ms + duration_ms;
        let actor = self.actor_mut(actor)?;
        if !actor.alive {
            return Ok(());
        }
        for &control in controls {
            actor.controls.retain(|&(c, _)| c != control);
            actor.controls.push((control, release));
        }
        Ok(())
    }

    fn issue_attack(&mut self, actor: ActorId, target: ActorId) -> Result<()> {
        let attacker = self.actor(actor)?;
        let (origin, equipped, attacker_alive) = (attacker.position, attacker.equipped, attacker.alive);
        let jitter: f32 = self.rng.gen_range(0.9..1.1);
        let clock = self.clock_ms;

        let victim = self.actors.get_mut(&target).ok_or(DuelistError::UnknownActor(target))?;
        if !attacker_alive || !victim.alive || origin.distance(victim.position) > ATTACK_REACH {
            return Ok(());
        }
        if victim
            .last_hurt_ms
            .map_or(false, |t| clock.saturating_sub(t) < HURT_COOLDOWN_MS)
        {
            return Ok(());
        }

        let base = if equipped { SWORD_DAMAGE } else { FIST_DAMAGE };
        let armor = if victim.equipped { ARMOR_FACTOR } else { 1.0 };

        let planar = origin.planar_distance(victim.position);
        if planar > 0.0 {
            victim.position.x += (victim.position.x - origin.x) / planar * KNOCKBACK;
            victim.position.z += (victim.position.z - origin.z) / planar * KNOCKBACK;
            if let Some(bounds) = victim.bounds {
                bounds.clamp(&mut victim.position);
            }
        }
        Self::apply_damage(victim, target, base * armor * jitter, clock, &mut self.events);
        Ok(())
    }

    fn issue_look(&mut self, actor: ActorId, target: Vec3) -> Result<()> {
        let actor = self.actor_mut(actor)?;
        let (dx, dz) = (target.x - actor.position.x, target.z - actor.position.z);
        if dx != 0.0 || dz != 0.0 {
            actor.yaw = dz.atan2(dx);
        }
        Ok(())
    }

    fn teleport(&mut self, actor: ActorId, position: Vec3) -> Result<()> {
        let bounds = self.arenas.iter().copied().find(|b| b.contains(position));
        let id = actor;
        let actor = self.actors.get_mut(&id).ok_or(DuelistError::UnknownActor(id))?;
        actor.position = position;
        actor.velocity = Vec3::ZERO;
        actor.bounds = bounds;
        if !actor.alive {
            actor.alive = true;
            actor.health = MAX_HEALTH;
            actor.food = MAX_HEALTH;
            actor.last_hurt_ms = None;
            self.events.push(WorldEvent::Spawned { actor: id });
        }
        Ok(())
    }

    fn build_arena(&mut self, center: Vec3, size: f32) -> Result<()> {
        if size <= 0.0 {
            return Err(DuelistError::invalid_parameter("size", "arena size must be > 0"));
        }
        self.arenas.push(Bounds {
            min_x: center.x - size,
            max_x: center.x + size,
            min_z: center.z - size,
            max_z: center.z + size,
            floor_y: center.y,
        });
        Ok(())
    }

    fn heal_and_equip(&mut self, actor: ActorId) -> Result<()> {
        let id = actor;
        let actor = self.actors.get_mut(&id).ok_or(DuelistError::UnknownActor(id))?;
        actor.equipped = true;
        if actor.alive {
            actor.food = MAX_HEALTH;
            if actor.health < MAX_HEALTH {
                actor.health = MAX_HEALTH;
                self.events.push(WorldEvent::HealthChanged { actor: id, health: MAX_HEALTH });
            }
        }
        Ok(())
    }

    fn settle(&mut self, duration_ms: u64) {
        let mut remaining = duration_ms;
        while remaining > 0 {
            let dt = remaining.min(TICK_MS);
            self.tick(dt);
            remaining -= dt;
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock_ms
    }

    fn poll_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }
}
