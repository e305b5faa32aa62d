//! Training configuration, loadable from TOML.
//!
//! Every section uses `#[serde(default)]`, so a file only needs to name the knobs it
//! changes. The full configuration in effect is embedded in every checkpoint.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DuelistError, Result};
use crate::world::Vec3;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub arena: ArenaConfig,
    pub agent: AgentConfig,
    pub rewards: RewardConfig,
    pub combat: CombatConfig,
    pub training: TrainingConfig,
}

/// Endpoint of the world server the actors join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "localhost".to_string(),
            port: 25565,
            version: "1.19.4".to_string(),
        }
    }
}

/// Arena geometry. Arena `i` is centered at `center.x + i * spacing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Half-width of the walled square.
    pub size: f32,
    pub respawn_y: f32,
    pub spacing: f32,
    pub center: Vec3,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        ArenaConfig {
            size: 15.0,
            respawn_y: -57.0,
            spacing: 30.0,
            center: Vec3::new(100.0, -60.0, 100.0),
        }
    }
}

impl ArenaConfig {
    pub fn center_of(&self, arena: usize) -> Vec3 {
        Vec3::new(
            self.center.x + arena as f32 * self.spacing,
            self.center.y,
            self.center.z,
        )
    }
}

/// Learning hyperparameters of the shared agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub learning_rate: f32,
    pub discount_factor: f32,
    pub epsilon_start: f32,
    pub epsilon_decay: f32,
    pub epsilon_min: f32,
    pub batch_size: usize,
    /// Learning is skipped until the memory holds at least this many transitions.
    pub min_memory_size: usize,
    pub memory_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            learning_rate: 0.01,
            discount_factor: 0.99,
            epsilon_start: 1.0,
            epsilon_decay: 0.9995,
            epsilon_min: 0.05,
            batch_size: 32,
            min_memory_size: 50,
            memory_capacity: 50_000,
        }
    }
}

/// Reward magnitudes. Per-point rewards are multiplied by the health delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub kill: f32,
    pub hit: f32,
    pub damage_dealt: f32,
    pub death: f32,
    pub damage_taken: f32,
    pub proximity: f32,
    pub far_away: f32,
    /// Planar distance beyond which `far_away` applies.
    pub far_distance: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            kill: 200.0,
            hit: 20.0,
            damage_dealt: 3.0,
            death: -200.0,
            damage_taken: -3.0,
            proximity: 1.0,
            far_away: -1.5,
            far_distance: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub attack_cooldown_ms: u64,
    pub attack_reach: f32,
    pub optimal_distance: f32,
    pub respawn_delay_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        CombatConfig {
            attack_cooldown_ms: 500,
            attack_reach: 4.0,
            optimal_distance: 3.5,
            respawn_delay_ms: 2000,
        }
    }
}

/// Episode loop, schedule and persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub num_duels: usize,
    pub episodes_per_session: usize,
    pub max_steps_per_episode: usize,
    pub tick_interval_ms: u64,
    pub reset_settle_ms: u64,
    pub arena_settle_ms: u64,
    pub episode_pause_ms: u64,
    /// A combatant calls `learn` every this many of its own steps.
    pub learn_every: usize,
    pub save_interval: u64,
    pub target_update_interval: u64,
    pub log_interval: u64,
    pub history_size: usize,
    pub model_path: PathBuf,
    /// Seed for the built-in simulator and spawn placement. Random when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            num_duels: 5,
            episodes_per_session: 100,
            max_steps_per_episode: 600,
            tick_interval_ms: 50,
            reset_settle_ms: 3000,
            arena_settle_ms: 1000,
            episode_pause_ms: 500,
            learn_every: 4,
            save_interval: 10,
            target_update_interval: 5,
            log_interval: 1,
            history_size: 1000,
            model_path: PathBuf::from("./model/pvp_model.json"),
            seed: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let (agent, rewards, combat, arena) = (&self.agent, &self.rewards, &self.combat, &self.arena);
        for (name, value) in [
            ("agent.learning_rate", agent.learning_rate),
            ("agent.discount_factor", agent.discount_factor),
            ("agent.epsilon_start", agent.epsilon_start),
            ("agent.epsilon_decay", agent.epsilon_decay),
            ("agent.epsilon_min", agent.epsilon_min),
            ("rewards.kill", rewards.kill),
            ("rewards.hit", rewards.hit),
            ("rewards.damage_dealt", rewards.damage_dealt),
            ("rewards.death", rewards.death),
            ("rewards.damage_taken", rewards.damage_taken),
            ("rewards.proximity", rewards.proximity),
            ("rewards.far_away", rewards.far_away),
            ("rewards.far_distance", rewards.far_distance),
            ("combat.attack_reach", combat.attack_reach),
            ("combat.optimal_distance", combat.optimal_distance),
            ("arena.size", arena.size),
            ("arena.respawn_y", arena.respawn_y),
            ("arena.spacing", arena.spacing),
            ("arena.center.x", arena.center.x),
            ("arena.center.y", arena.center.y),
            ("arena.center.z", arena.center.z),
        ] {
            if !value.is_finite() {
                return Err(DuelistError::invalid_parameter(name, "must be finite"));
            }
        }

        if agent.learning_rate <= 0.0 {
            return Err(DuelistError::invalid_parameter("agent.learning_rate", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&agent.discount_factor) {
            return Err(DuelistError::invalid_parameter("agent.discount_factor", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&agent.epsilon_start) {
            return Err(DuelistError::invalid_parameter("agent.epsilon_start", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&agent.epsilon_min) || agent.epsilon_min > agent.epsilon_start {
            return Err(DuelistError::invalid_parameter(
                "agent.epsilon_min",
                "must be in [0, epsilon_start]",
            ));
        }
        if agent.epsilon_decay <= 0.0 || agent.epsilon_decay > 1.0 {
            return Err(DuelistError::invalid_parameter("agent.epsilon_decay", "must be in (0, 1]"));
        }
        if agent.batch_size == 0 {
            return Err(DuelistError::invalid_parameter("agent.batch_size", "must be > 0"));
        }
        if agent.memory_capacity < agent.min_memory_size {
            return Err(DuelistError::invalid_parameter(
                "agent.memory_capacity",
                "must be >= agent.min_memory_size",
            ));
        }

        let training = &self.training;
        if training.num_duels == 0 {
            return Err(DuelistError::invalid_parameter("training.num_duels", "must be >= 1"));
        }
        if training.max_steps_per_episode == 0 {
            return Err(DuelistError::invalid_parameter(
                "training.max_steps_per_episode",
                "must be > 0",
            ));
        }
        for (name, value) in [
            ("training.save_interval", training.save_interval),
            ("training.target_update_interval", training.target_update_interval),
            ("training.log_interval", training.log_interval),
            ("training.learn_every", training.learn_every as u64),
            ("training.history_size", training.history_size as u64),
        ] {
            if value == 0 {
                return Err(DuelistError::invalid_parameter(name, "must be > 0"));
            }
        }

        if self.arena.size <= 2.0 {
            return Err(DuelistError::invalid_parameter("arena.size", "must be > 2"));
        }
        if self.arena.spacing < 2.0 * self.arena.size {
            return Err(DuelistError::invalid_parameter(
                "arena.spacing",
                "must be at least twice arena.size so arenas do not overlap",
            ));
        }
        if self.combat.optimal_distance <= 0.0 || self.combat.attack_reach <= 0.0 {
            return Err(DuelistError::invalid_parameter(
                "combat",
                "optimal_distance and attack_reach must be > 0",
            ));
        }
        Ok(())
    }

    /// Generate a TOML string with all default values.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.training;
        let a = &self.agent;
        let r = &self.rewards;
        writeln!(f, "Training:")?;
        writeln!(f, "  duels: {} ({} fighters)", t.num_duels, t.num_duels * 2)?;
        writeln!(f, "  episodes per session: {}", t.episodes_per_session)?;
        writeln!(f, "  max steps per episode: {} ({} ms ticks)", t.max_steps_per_episode, t.tick_interval_ms)?;
        writeln!(f, "  save every {} episodes to {}", t.save_interval, t.model_path.display())?;
        writeln!(f, "  target sync every {} episodes", t.target_update_interval)?;
        writeln!(f, "Learning:")?;
        writeln!(f, "  learning rate: {}", a.learning_rate)?;
        writeln!(f, "  discount factor: {}", a.discount_factor)?;
        writeln!(f, "  exploration: {} -> {} (decay {})", a.epsilon_start, a.epsilon_min, a.epsilon_decay)?;
        writeln!(f, "  batch size: {} (min memory {}, capacity {})", a.batch_size, a.min_memory_size, a.memory_capacity)?;
        writeln!(f, "Rewards:")?;
        writeln!(f, "  kill: {:+}  hit: {:+}  death: {:+}", r.kill, r.hit, r.death)?;
        writeln!(f, "  damage dealt: {:+} per HP  damage taken: {:+} per HP", r.damage_dealt, r.damage_taken)?;
        writeln!(f, "  proximity: {:+}  far away (> {}): {:+}", r.proximity, r.far_distance, r.far_away)?;
        writeln!(f, "Combat:")?;
        writeln!(
            f,
            "  attack cooldown: {} ms  reach: {}  optimal distance: {}",
            self.combat.attack_cooldown_ms, self.combat.attack_reach, self.combat.optimal_distance
        )?;
        writeln!(f, "Server:")?;
        write!(f, "  {}:{} ({})", self.server.host, self.server.port, self.server.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().expect("default config should be valid");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[agent]
learning_rate = 0.001

[rewards]
kill = 500.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!((config.agent.learning_rate - 0.001).abs() < 1e-9);
        assert_eq!(config.rewards.kill, 500.0);
        assert_eq!(config.rewards.death, -200.0);
        assert_eq!(config.training.save_interval, 10);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_default_toml_roundtrips() {
        let config: Config = toml::from_str(&Config::default_toml()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duelist.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[training]\nnum_duels = 2\nseed = 7").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.training.num_duels, 2);
        assert_eq!(config.training.seed, Some(7));
        assert_eq!(config.agent.batch_size, 32);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.training.num_duels, 5);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.agent.learning_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.agent.epsilon_min = 0.5;
        config.agent.epsilon_start = 0.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.num_duels = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.save_interval = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.arena.spacing = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_finite_values() {
        let mut config = Config::default();
        config.arena.size = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rewards.kill = f32::INFINITY;
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[agent]\nlearning_rate = nan").unwrap();
        assert!(config.agent.learning_rate.is_nan());
        match config.validate() {
            Err(DuelistError::InvalidParameter { name, .. }) => assert_eq!(name, "agent.learning_rate"),
            other => panic!("expected invalid learning rate, got {:?}", other),
        }
    }

    #[test]
    fn test_arena_centers_are_spaced_along_x() {
        let arena = ArenaConfig::default();
        assert_eq!(arena.center_of(0), arena.center);
        assert_eq!(arena.center_of(3).x, arena.center.x + 90.0);
        assert_eq!(arena.center_of(3).z, arena.center.z);
    }

    #[test]
    fn test_summary_names_key_knobs() {
        let summary = Config::default().to_string();
        assert!(summary.contains("learning rate: 0.01"));
        assert!(summary.contains("kill: +200"));
        assert!(summary.contains("localhost:25565"));
    }
}
