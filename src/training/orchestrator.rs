use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::checkpoint::{Checkpoint, CheckpointStore};
use crate::agent::Agent;
use crate::combatant::{Combatant, CombatantStats};
use crate::config::Config;
use crate::error::{DuelistError, Result};
use crate::metrics::{EpisodeHistory, EpisodeStats, RecentPerformance};
use crate::world::{Vec3, World, WorldEvent, MAX_HEALTH};

/// Episodes averaged in reports.
const RECENT_WINDOW: usize = 10;

/// Where the agent comes from when the orchestrator is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Fresh,
    /// Load the checkpoint at the configured model path, falling back to a fresh agent.
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodePhase {
    Resetting,
    Running,
    Reporting,
    Finished,
}

/// How a single episode ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodeEnd {
    Completed(EpisodeStats),
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub total_episodes: u64,
    pub session_episodes: u64,
    pub final_epsilon: f32,
    pub recent: Option<RecentPerformance>,
    pub combatants: Vec<CombatantStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    Completed(TrainingSummary),
    /// The shutdown flag was raised; a checkpoint was written before returning.
    Interrupted(TrainingSummary),
}

/// Drives the episode loop over every arena in lockstep.
///
/// The orchestrator owns the shared agent, the world, and one [`Combatant`] per actor.
/// Arena `i` hosts combatants `2i` and `2i + 1`, which are each other's opponents.
pub struct TrainingOrchestrator<W: World> {
    config: Config,
    world: W,
    agent: Agent,
    combatants: Vec<Combatant>,
    arenas: Vec<Vec3>,
    history: EpisodeHistory,
    total_episodes: u64,
    session_episode: u64,
    phase: EpisodePhase,
    store: CheckpointStore,
    shutdown: Arc<AtomicBool>,
    started: Instant,
    rng: StdRng,
}

impl<W: World> TrainingOrchestrator<W> {
    pub fn new(config: Config, world: W, mode: StartMode) -> Result<Self> {
        config.validate()?;
        let training = &config.training;
        let store = CheckpointStore::new(&training.model_path, training.save_interval);
        let mut rng = match training.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let restored = match mode {
            StartMode::Fresh => None,
            StartMode::Resume => Self::restore(&store, &config),
        };
        let (agent, history, total_episodes) = match restored {
            Some(restored) => restored,
            None => {
                let agent = match training.seed {
                    Some(_) => Agent::with_seed(&config.agent, rng.gen())?,
                    None => Agent::new(&config.agent)?,
                };
                (agent, EpisodeHistory::new(training.history_size), 0)
            }
        };
        let mut agent = agent;
        if training.seed.is_some() {
            agent.reseed(rng.gen());
        }

        Ok(TrainingOrchestrator {
            config,
            world,
            agent,
            combatants: Vec::new(),
            arenas: Vec::new(),
            history,
            total_episodes,
            session_episode: 0,
            phase: EpisodePhase::Resetting,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            rng,
        })
    }

    fn restore(store: &CheckpointStore, config: &Config) -> Option<(Agent, EpisodeHistory, u64)> {
        let path = store.path().display().to_string();
        let checkpoint = match store.load() {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => {
                info!(path = %path, "no saved model found, starting fresh");
                return None;
            }
            Err(e) => {
                warn!(path = %path, error = %e, "failed to load model, starting fresh");
                return None;
            }
        };

        let history = EpisodeHistory::from_lists(
            checkpoint.episode_rewards,
            checkpoint.episode_kills,
            checkpoint.episode_lengths,
            config.training.history_size,
        );
        let restored = history.and_then(|history| {
            Agent::from_snapshot(checkpoint.agent, &config.agent).map(|agent| (agent, history))
        });
        match restored {
            Ok((agent, history)) => {
                info!(
                    path = %path,
                    episode = checkpoint.total_episodes,
                    epsilon = agent.epsilon(),
                    saved_at = %checkpoint.timestamp,
                    "model loaded, resuming"
                );
                Some((agent, history, checkpoint.total_episodes))
            }
            Err(e) => {
                warn!(path = %path, error = %e, "saved model is unusable, starting fresh");
                None
            }
        }
    }

    /// Flag that, once set, makes training save and return at the next tick.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Build the arenas, connect every combatant and pair opponents.
    pub fn initialize(&mut self) -> Result<()> {
        let training = &self.config.training;
        info!(duels = training.num_duels, "initializing training system");

        self.arenas = (0..training.num_duels).map(|i| self.config.arena.center_of(i)).collect();
        for (i, center) in self.arenas.iter().enumerate() {
            self.world.build_arena(*center, self.config.arena.size)?;
            debug!(arena = i, x = center.x, "arena built");
        }
        self.world.settle(training.arena_settle_ms);

        self.combatants.clear();
        for n in 0..training.num_duels * 2 {
            let name = format!("Fighter{}", n + 1);
            let arena = n / 2;
            let actor = self.world.connect(&name)?;
            info!(combatant = %name, actor = %actor, arena, "connected");
            self.combatants.push(Combatant::new(&name, actor, arena, self.arenas[arena], &self.config));
        }
        for pair in self.combatants.chunks_mut(2) {
            if let [a, b] = pair {
                let (a_id, b_id) = (a.actor(), b.actor());
                a.set_opponent(b_id);
                b.set_opponent(a_id);
            }
        }
        self.world.poll_events();

        self.phase = EpisodePhase::Resetting;
        info!("training system initialized");
        Ok(())
    }

    /// Run the configured number of episodes, then write a final checkpoint.
    pub fn train(&mut self) -> Result<TrainingOutcome> {
        if self.combatants.is_empty() {
            self.initialize()?;
        }
        let training = &self.config.training;
        info!(
            episodes = training.episodes_per_session,
            save_interval = training.save_interval,
            model_path = %training.model_path.display(),
            "starting training"
        );

        match self.run_session() {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) => {
                self.phase = EpisodePhase::Finished;
                self.save_checkpoint()?;
                let summary = self.summary();
                self.log_final(&summary);
                Ok(TrainingOutcome::Completed(summary))
            }
            Err(e) => {
                warn!(error = %e, "training aborted, attempting checkpoint");
                if let Err(save_error) = self.save_checkpoint() {
                    warn!(error = %save_error, "emergency checkpoint failed");
                }
                self.phase = EpisodePhase::Finished;
                Err(e)
            }
        }
    }

    fn run_session(&mut self) -> Result<Option<TrainingOutcome>> {
        for _ in 0..self.config.training.episodes_per_session {
            if self.shutdown_requested() {
                return self.interrupt().map(Some);
            }
            if let EpisodeEnd::Interrupted = self.run_episode()? {
                return self.interrupt().map(Some);
            }
            self.world.settle(self.config.training.episode_pause_ms);
        }
        Ok(None)
    }

    fn interrupt(&mut self) -> Result<TrainingOutcome> {
        warn!(episode = self.total_episodes, "interrupt received, saving checkpoint");
        self.phase = EpisodePhase::Finished;
        self.save_checkpoint()?;
        Ok(TrainingOutcome::Interrupted(self.summary()))
    }

    /// Run one full episode: reset, run every arena to termination or the step cap,
    /// then report. An interrupted episode is not counted.
    pub fn run_episode(&mut self) -> Result<EpisodeEnd> {
        self.session_episode += 1;
        self.total_episodes += 1;
        info!(
            episode = self.total_episodes,
            session = self.session_episode,
            of = self.config.training.episodes_per_session,
            "episode starting"
        );

        self.reset_episode()?;

        self.phase = EpisodePhase::Running;
        let started_ms = self.world.now_ms();
        let max_steps = self.config.training.max_steps_per_episode;
        let mut active: BTreeSet<usize> = (0..self.arenas.len()).collect();
        let mut steps = 0;
        while steps < max_steps && !active.is_empty() {
            if self.shutdown_requested() {
                self.session_episode -= 1;
                self.total_episodes -= 1;
                return Ok(EpisodeEnd::Interrupted);
            }
            self.tick(&mut active)?;
            steps += 1;
        }

        self.phase = EpisodePhase::Reporting;
        let duration_ms = self.world.now_ms().saturating_sub(started_ms);
        let stats = self.report_episode(steps, duration_ms)?;
        Ok(EpisodeEnd::Completed(stats))
    }

    /// Reset every combatant, heal and equip it, and drop it at a random point of its arena.
    pub fn reset_episode(&mut self) -> Result<()> {
        self.phase = EpisodePhase::Resetting;
        let spread = (self.config.arena.size - 2.0) / 2.0;
        let spawn_y = self.config.arena.respawn_y;
        for combatant in &mut self.combatants {
            combatant.reset_episode();
            self.world.heal_and_equip(combatant.actor())?;
            let center = self.arenas[combatant.arena()];
            let x = center.x + self.rng.gen_range(-spread..spread);
            let z = center.z + self.rng.gen_range(-spread..spread);
            self.world.teleport(combatant.actor(), Vec3::new(x, spawn_y, z))?;
        }
        self.world.settle(self.config.training.reset_settle_ms);
        self.dispatch_events()
    }

    /// Advance every arena in `active` by one step and remove the arenas whose fight ended.
    pub fn tick(&mut self, active: &mut BTreeSet<usize>) -> Result<()> {
        let now = self.world.now_ms();
        for combatant in &mut self.combatants {
            if combatant.respawn_due(now) {
                self.world.teleport(combatant.actor(), combatant.respawn_point())?;
                combatant.mark_respawned();
                debug!(combatant = %combatant.name(), "respawned");
            }
        }

        for combatant in self.combatants.iter_mut().filter(|c| active.contains(&c.arena())) {
            combatant.step(&mut self.agent, &mut self.world)?;
        }
        self.world.settle(self.config.training.tick_interval_ms);

        for combatant in self.combatants.iter_mut().filter(|c| active.contains(&c.arena())) {
            combatant.resolve_strike(&self.world);
        }
        self.dispatch_events()?;

        let world = &self.world;
        let finished: Vec<usize> = active
            .iter()
            .copied()
            .filter(|&arena| {
                self.combatants
                    .iter()
                    .filter(|c| c.arena() == arena)
                    .any(|c| world.observe(c.actor()).map_or(false, |s| s.health <= 0.0))
            })
            .collect();
        for arena in finished {
            active.remove(&arena);
            debug!(arena, "fight finished");
        }
        Ok(())
    }

    fn dispatch_events(&mut self) -> Result<()> {
        let now = self.world.now_ms();
        for event in self.world.poll_events() {
            match event {
                WorldEvent::HealthChanged { actor, health } => {
                    for combatant in &mut self.combatants {
                        if combatant.actor() == actor {
                            combatant.on_health_changed(health);
                        } else if combatant.opponent() == Some(actor) {
                            combatant.on_opponent_health(health);
                        }
                    }
                }
                WorldEvent::Died { actor } => {
                    if let Some(combatant) = self.combatants.iter_mut().find(|c| c.actor() == actor) {
                        combatant.on_death(&mut self.agent, now)?;
                    }
                }
                WorldEvent::Spawned { actor } => {
                    for combatant in &mut self.combatants {
                        if combatant.actor() == actor {
                            combatant.on_spawn();
                        } else if combatant.opponent() == Some(actor) {
                            combatant.on_opponent_health(MAX_HEALTH);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn report_episode(&mut self, steps: usize, duration_ms: u64) -> Result<EpisodeStats> {
        let count = self.combatants.len().max(1) as f32;
        let stats = EpisodeStats {
            total_reward: self.combatants.iter().map(|c| c.episode_reward()).sum::<f32>() / count,
            total_kills: self.combatants.iter().map(|c| c.episode_kills()).sum(),
            step_count: steps,
        };
        self.history.record(stats);

        let training = &self.config.training;
        if self.total_episodes % training.target_update_interval == 0 {
            self.agent.update_target_network();
            info!(episode = self.total_episodes, "target network updated");
        }
        if self.total_episodes % training.save_interval == 0 {
            self.save_checkpoint()?;
        }

        if self.session_episode % self.config.training.log_interval == 0 {
            self.log_detailed(steps, duration_ms);
        } else {
            info!(
                episode = self.total_episodes,
                duration_s = duration_ms as f32 / 1000.0,
                steps,
                avg_reward = stats.total_reward,
                epsilon = self.agent.epsilon(),
                "episode finished"
            );
        }
        Ok(stats)
    }

    /// Write a checkpoint. Write failures are logged and training continues, except a
    /// storage directory that cannot be created before anything was ever saved.
    pub fn save_checkpoint(&mut self) -> Result<()> {
        let checkpoint = self.checkpoint();
        match self.store.save(&checkpoint) {
            Ok(backup) => {
                info!(
                    path = %self.store.path().display(),
                    episode = self.total_episodes,
                    epsilon = self.agent.epsilon(),
                    "model saved"
                );
                if let Some(backup) = backup {
                    info!(path = %backup.display(), "backup saved");
                }
                Ok(())
            }
            Err(e @ DuelistError::StorageUnavailable { .. }) if !self.store.saved_once() => Err(e),
            Err(e) => {
                warn!(episode = self.total_episodes, error = %e, "failed to save model, continuing in memory");
                Ok(())
            }
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            agent: self.agent.snapshot(),
            total_episodes: self.total_episodes,
            episode_rewards: self.history.rewards(),
            episode_kills: self.history.kills(),
            episode_lengths: self.history.lengths(),
            timestamp: Utc::now(),
            config: self.config.clone(),
        }
    }

    /// Disconnect every actor. Failures are logged per actor and otherwise ignored.
    pub fn shutdown(&mut self) {
        info!("cleaning up");
        for combatant in self.combatants.drain(..) {
            if let Err(e) = self.world.disconnect(combatant.actor()) {
                warn!(combatant = %combatant.name(), error = %e, "disconnect failed");
            }
        }
    }

    pub fn summary(&self) -> TrainingSummary {
        TrainingSummary {
            total_episodes: self.total_episodes,
            session_episodes: self.session_episode,
            final_epsilon: self.agent.epsilon(),
            recent: self.history.recent(RECENT_WINDOW),
            combatants: self.combatants.iter().map(Combatant::stats).collect(),
        }
    }

    fn log_detailed(&self, steps: usize, duration_ms: u64) {
        let total_secs = self.started.elapsed().as_secs_f32();
        info!(
            total_minutes = total_secs / 60.0,
            avg_episode_s = total_secs / self.session_episode.max(1) as f32,
            last_episode_s = duration_ms as f32 / 1000.0,
            steps,
            "time stats"
        );
        info!(
            total_episodes = self.total_episodes,
            memory = self.agent.memory().len(),
            capacity = self.agent.memory().capacity(),
            epsilon = self.agent.epsilon(),
            learning_rate = self.config.agent.learning_rate,
            batch_size = self.config.agent.batch_size,
            "agent stats"
        );
        if let Some(recent) = self.history.recent(RECENT_WINDOW) {
            info!(
                episodes = recent.episodes,
                avg_reward = recent.avg_reward,
                avg_kills = recent.avg_kills,
                avg_length = recent.avg_length,
                "recent performance"
            );
        }
        for combatant in &self.combatants {
            info!("{}", combatant.stats());
        }
        if let (Some(best_reward), Some(most_kills)) = (self.history.best_reward(), self.history.most_kills()) {
            match self.history.fastest_kill() {
                Some(fastest) => info!(best_reward, most_kills, fastest_kill_steps = fastest, "all-time records"),
                None => info!(best_reward, most_kills, "all-time records"),
            }
        }
    }

    fn log_final(&self, summary: &TrainingSummary) {
        info!(
            total_episodes = summary.total_episodes,
            final_epsilon = summary.final_epsilon,
            model_path = %self.store.path().display(),
            "training complete"
        );
        for stats in &summary.combatants {
            info!(
                "{}: {}K / {}D (K/D: {:.2})",
                stats.name,
                stats.kills,
                stats.deaths,
                stats.kd_ratio()
            );
        }
        if self.history.len() >= RECENT_WINDOW {
            if let Some(recent) = summary.recent {
                info!(avg_reward = recent.avg_reward, "final 10-episode average");
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut Agent {
        &mut self.agent
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn history(&self) -> &EpisodeHistory {
        &self.history
    }

    pub fn total_episodes(&self) -> u64 {
        self.total_episodes
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
