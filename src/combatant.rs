//! Per-actor duel controller.
//!
//! A [`Combatant`] binds one world actor to the shared [`Agent`]. It turns observations
//! into state vectors, agent decisions into world commands, and world notifications into
//! reward bookkeeping. The agent and world are passed into every call, so the
//! orchestrator stays the single owner of both.

use std::fmt;

use tracing::{debug, info};

use crate::agent::{Action, Agent, StateVector};
use crate::config::{CombatConfig, Config, RewardConfig};
use crate::error::Result;
use crate::replay_buffer::Transition;
use crate::world::{ActorId, Vec3, World, ENTITY_HEIGHT, MAX_HEALTH};

/// Fraction of the opponent's height the combatant aims at.
const LOOK_HEIGHT_FACTOR: f32 = 0.9;

/// Below this planar distance the proximity reward does not apply.
const MIN_PROXIMITY_DISTANCE: f32 = 2.0;

/// An attack waiting for the world to report its outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingStrike {
    target: ActorId,
    /// Opponent health observed when the attack was issued.
    health_before: f32,
}

/// Counters reported by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatantStats {
    pub name: String,
    pub kills: u32,
    pub deaths: u32,
    pub hits: u32,
    pub episode_reward: f32,
    pub damage_dealt: f32,
    pub damage_taken: f32,
}

impl CombatantStats {
    /// Kills per death, or plain kills before the first death.
    pub fn kd_ratio(&self) -> f32 {
        if self.deaths > 0 {
            self.kills as f32 / self.deaths as f32
        } else {
            self.kills as f32
        }
    }
}

impl fmt::Display for CombatantStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: K/D {:.2} ({}K / {}D) | hits {} | damage {:.1} dealt / {:.1} taken | last reward {:.1}",
            self.name,
            self.kd_ratio(),
            self.kills,
            self.deaths,
            self.hits,
            self.damage_dealt,
            self.damage_taken,
            self.episode_reward
        )
    }
}

pub struct Combatant {
    name: String,
    actor: ActorId,
    opponent: Option<ActorId>,
    arena: usize,
    respawn_point: Vec3,
    rewards: RewardConfig,
    combat: CombatConfig,
    learn_every: usize,

    current_state: Option<StateVector>,
    current_action: Option<usize>,
    episode_reward: f32,
    step_count: usize,
    last_health: f32,
    last_opponent_health: f32,
    opponent_reported_health: f32,
    last_distance: Option<f32>,
    last_attack_ms: Option<u64>,
    pending_strike: Option<PendingStrike>,
    respawn_at: Option<u64>,
    last_loss: Option<f32>,

    kills: u32,
    episode_kills: u32,
    deaths: u32,
    hits: u32,
    damage_dealt: f32,
    damage_taken: f32,
}

impl Combatant {
    /// Create a controller for `actor` fighting in arena `arena`, respawning above
    /// `arena_center` at the configured height.
    pub fn new(name: &str, actor: ActorId, arena: usize, arena_center: Vec3, config: &Config) -> Self {
        Combatant {
            name: name.to_string(),
            actor,
            opponent: None,
            arena,
            respawn_point: Vec3::new(arena_center.x, config.arena.respawn_y, arena_center.z),
            rewards: config.rewards.clone(),
            combat: config.combat.clone(),
            learn_every: config.training.learn_every.max(1),
            current_state: None,
            current_action: None,
            episode_reward: 0.0,
            step_count: 0,
            last_health: MAX_HEALTH,
            last_opponent_health: MAX_HEALTH,
            opponent_reported_health: MAX_HEALTH,
            last_distance: None,
            last_attack_ms: None,
            pending_strike: None,
            respawn_at: None,
            last_loss: None,
            kills: 0,
            episode_kills: 0,
            deaths: 0,
            hits: 0,
            damage_dealt: 0.0,
            damage_taken: 0.0,
        }
    }

    pub fn set_opponent(&mut self, opponent: ActorId) {
        self.opponent = Some(opponent);
    }

    /// Advance this combatant by one decision step.
    pub fn step<W: World + ?Sized>(&mut self, agent: &mut Agent, world: &mut W) -> Result<()> {
        self.resolve_strike(world);

        let opponent_id = match self.opponent {
            Some(id) => id,
            None => return Ok(()),
        };
        let own = match world.observe(self.actor) {
            Some(own) if own.alive => own,
            _ => return Ok(()),
        };
        let opponent = match world.observe(opponent_id) {
            Some(opponent) if opponent.alive => opponent,
            _ => return Ok(()),
        };

        if self.last_opponent_health > self.opponent_reported_health {
            let damage = self.last_opponent_health - self.opponent_reported_health;
            self.damage_dealt += damage;
            self.episode_reward += self.rewards.damage_dealt * damage;
        }
        self.last_opponent_health = self.opponent_reported_health;

        let state = agent.encode_state(
            Some(&own),
            Some(&opponent),
            self.last_distance,
            self.opponent_reported_health,
        );
        let distance = own.position.planar_distance(opponent.position);

        if self.current_state.is_some() {
            self.episode_reward += self.proximity_reward(distance);
        }

        let action = agent.select_action(state.view())?;

        if let (Some(prev_state), Some(prev_action)) = (self.current_state.take(), self.current_action) {
            agent.remember(Transition {
                state: prev_state,
                action: prev_action,
                reward: 0.0,
                next_state: state.clone(),
                terminal: false,
            })?;
        }

        self.current_state = Some(state);
        self.current_action = Some(action);
        self.step_count += 1;
        self.last_distance = Some(distance);

        let look_at = opponent.position.offset(0.0, ENTITY_HEIGHT * LOOK_HEIGHT_FACTOR, 0.0);
        world.issue_look(self.actor, look_at)?;
        self.execute(action, opponent_id, opponent.health, distance, world)?;

        if self.step_count % self.learn_every == 0 {
            if let Some(loss) = agent.learn()? {
                self.last_loss = Some(loss);
                debug!(combatant = %self.name, loss, epsilon = agent.epsilon(), "learned");
            }
        }
        Ok(())
    }

    fn proximity_reward(&self, distance: f32) -> f32 {
        if distance > MIN_PROXIMITY_DISTANCE && distance < self.combat.optimal_distance * 1.5 {
            self.rewards.proximity
        } else if distance > self.rewards.far_distance {
            self.rewards.far_away
        } else {
            0.0
        }
    }

    fn execute<W: World + ?Sized>(
        &mut self,
        action: usize,
        opponent: ActorId,
        opponent_health: f32,
        distance: f32,
        world: &mut W,
    ) -> Result<()> {
        let action = match Action::from_index(action) {
            Some(action) => action,
            None => return Ok(()),
        };
        if action != Action::Attack {
            return world.issue_movement(self.actor, action.controls(), action.pulse_ms());
        }

        let now = world.now_ms();
        let cooled_down = self
            .last_attack_ms
            .map_or(true, |t| now.saturating_sub(t) > self.combat.attack_cooldown_ms);
        if distance < self.combat.attack_reach && cooled_down {
            world.issue_attack(self.actor, opponent)?;
            self.last_attack_ms = Some(now);
            self.hits += 1;
            self.pending_strike = Some(PendingStrike {
                target: opponent,
                health_before: opponent_health,
            });
        }
        Ok(())
    }

    /// Attribute kill or hit rewards for the last attack, once the world has had a
    /// chance to apply it. Does nothing without a pending strike.
    pub fn resolve_strike<W: World + ?Sized>(&mut self, world: &W) {
        let strike = match self.pending_strike.take() {
            Some(strike) => strike,
            None => return,
        };
        match world.observe(strike.target) {
            Some(target) if target.alive && target.health > 0.0 => {
                if target.health < strike.health_before {
                    self.episode_reward += self.rewards.hit;
                }
            }
            _ => {
                self.episode_reward += self.rewards.kill;
                self.kills += 1;
                self.episode_kills += 1;
                info!(combatant = %self.name, reward = self.rewards.kill, "scored a kill");
            }
        }
    }

    /// The actor died: store the terminal transition and schedule a respawn.
    pub fn on_death(&mut self, agent: &mut Agent, now_ms: u64) -> Result<()> {
        info!(combatant = %self.name, "died");
        self.deaths += 1;
        if let (Some(state), Some(action)) = (&self.current_state, self.current_action) {
            agent.remember(Transition::terminal(state.clone(), action, self.rewards.death))?;
            self.episode_reward += self.rewards.death;
        }
        self.respawn_at = Some(now_ms + self.combat.respawn_delay_ms);
        Ok(())
    }

    pub fn on_health_changed(&mut self, health: f32) {
        if health < self.last_health {
            let damage = self.last_health - health;
            self.damage_taken += damage;
            if self.current_state.is_some() && self.current_action.is_some() {
                self.episode_reward += self.rewards.damage_taken * damage;
            }
        }
        self.last_health = health;
    }

    /// Health the opponent reported about itself.
    pub fn on_opponent_health(&mut self, health: f32) {
        self.opponent_reported_health = health;
    }

    pub fn on_spawn(&mut self) {
        self.last_health = MAX_HEALTH;
    }

    pub fn respawn_due(&self, now_ms: u64) -> bool {
        self.respawn_at.map_or(false, |at| now_ms >= at)
    }

    /// Called after the orchestrator teleported the actor back to its arena.
    pub fn mark_respawned(&mut self) {
        self.respawn_at = None;
        self.last_health = MAX_HEALTH;
        self.last_opponent_health = MAX_HEALTH;
    }

    /// Clear all per-episode state. Lifetime counters are kept.
    pub fn reset_episode(&mut self) {
        self.episode_reward = 0.0;
        self.step_count = 0;
        self.current_state = None;
        self.current_action = None;
        self.last_health = MAX_HEALTH;
        self.last_opponent_health = MAX_HEALTH;
        self.opponent_reported_health = MAX_HEALTH;
        self.last_distance = None;
        self.last_attack_ms = None;
        self.pending_strike = None;
        self.respawn_at = None;
        self.episode_kills = 0;
        self.damage_dealt = 0.0;
    }

    pub fn stats(&self) -> CombatantStats {
        CombatantStats {
            name: self.name.clone(),
            kills: self.kills,
            deaths: self.deaths,
            hits: self.hits,
            episode_reward: self.episode_reward,
            damage_dealt: self.damage_dealt,
            damage_taken: self.damage_taken,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    pub fn opponent(&self) -> Option<ActorId> {
        self.opponent
    }

    pub fn arena(&self) -> usize {
        self.arena
    }

    pub fn respawn_point(&self) -> Vec3 {
        self.respawn_point
    }

    pub fn episode_reward(&self) -> f32 {
        self.episode_reward
    }

    pub fn episode_kills(&self) -> u32 {
        self.episode_kills
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn current_action(&self) -> Option<usize> {
        self.current_action
    }

    pub fn has_context(&self) -> bool {
        self.current_state.is_some() && self.current_action.is_some()
    }

    pub fn last_loss(&self) -> Option<f32> {
        self.last_loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::SimWorld;

    fn duel() -> (SimWorld, Combatant, ActorId) {
        let config = Config::default();
        let mut world = SimWorld::new(Some(3));
        let center = config.arena.center_of(0);
        world.build_arena(center, config.arena.size).unwrap();
        let own = world.connect("Fighter1").unwrap();
        let opponent = world.connect("Fighter2").unwrap();
        world.teleport(own, center).unwrap();
        world.teleport(opponent, center.offset(1.5, 0.0, 0.0)).unwrap();
        world.heal_and_equip(own).unwrap();
        world.poll_events();

        let mut combatant = Combatant::new("Fighter1", own, 0, center, &config);
        combatant.set_opponent(opponent);
        (world, combatant, opponent)
    }

    #[test]
    fn test_attack_scores_hit_and_respects_cooldown() {
        let (mut world, mut combatant, opponent) = duel();
        let attack = Action::Attack.index();

        combatant.execute(attack, opponent, MAX_HEALTH, 1.5, &mut world).unwrap();
        assert_eq!(combatant.hits, 1);
        combatant.resolve_strike(&world);
        assert_eq!(combatant.episode_reward, combatant.rewards.hit);
        assert_eq!(combatant.kills, 0);

        combatant.execute(attack, opponent, MAX_HEALTH, 1.5, &mut world).unwrap();
        assert_eq!(combatant.hits, 1);
        assert!(combatant.pending_strike.is_none());

        world.settle(600);
        combatant.execute(attack, opponent, MAX_HEALTH, 1.5, &mut world).unwrap();
        assert_eq!(combatant.hits, 2);
    }

    #[test]
    fn test_attack_out_of_reach_is_ignored() {
        let (mut world, mut combatant, opponent) = duel();
        combatant
            .execute(Action::Attack.index(), opponent, MAX_HEALTH, 5.0, &mut world)
            .unwrap();
        assert_eq!(combatant.hits, 0);
        assert!(combatant.pending_strike.is_none());
        assert_eq!(world.observe(opponent).unwrap().health, MAX_HEALTH);
    }

    #[test]
    fn test_lethal_strike_counts_kill() {
        let (mut world, mut combatant, opponent) = duel();
        world.inflict(opponent, MAX_HEALTH - 1.0).unwrap();
        world.settle(500);

        combatant.execute(Action::Attack.index(), opponent, 1.0, 1.5, &mut world).unwrap();
        combatant.resolve_strike(&world);
        assert_eq!(combatant.kills, 1);
        assert_eq!(combatant.episode_kills, 1);
        assert_eq!(combatant.episode_reward, combatant.rewards.kill);

        combatant.reset_episode();
        assert_eq!(combatant.episode_kills, 0);
        assert_eq!(combatant.kills, 1);
    }

    #[test]
    fn test_movement_action_issues_pulse() {
        let (mut world, mut combatant, opponent) = duel();
        let start = world.observe(combatant.actor).unwrap().position;
        combatant
            .execute(Action::Backward.index(), opponent, MAX_HEALTH, 1.5, &mut world)
            .unwrap();
        world.settle(150);
        let moved = world.observe(combatant.actor).unwrap().position;
        assert!(start.planar_distance(moved) > 0.3);
    }

    #[test]
    fn test_proximity_bands() {
        let (_, combatant, _) = duel();
        assert_eq!(combatant.proximity_reward(3.0), combatant.rewards.proximity);
        assert_eq!(combatant.proximity_reward(1.0), 0.0);
        assert_eq!(combatant.proximity_reward(7.0), 0.0);
        assert_eq!(combatant.proximity_reward(12.0), combatant.rewards.far_away);
    }
}
