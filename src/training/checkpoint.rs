//! JSON checkpoints with numbered backups.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::AgentSnapshot;
use crate::config::Config;
use crate::error::{DuelistError, Result};

/// Everything written to disk at a save point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub agent: AgentSnapshot,
    pub total_episodes: u64,
    #[serde(default)]
    pub episode_rewards: Vec<f32>,
    #[serde(default)]
    pub episode_kills: Vec<u32>,
    #[serde(default)]
    pub episode_lengths: Vec<usize>,
    pub timestamp: DateTime<Utc>,
    /// Configuration in effect when the checkpoint was written.
    pub config: Config,
}

/// Reads and writes checkpoints at a fixed path.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    backup_interval: u64,
    saved_once: bool,
}

impl CheckpointStore {
    /// A backup copy is written whenever the episode count is a multiple of
    /// `save_interval * 10`.
    pub fn new(path: impl Into<PathBuf>, save_interval: u64) -> Self {
        CheckpointStore {
            path: path.into(),
            backup_interval: save_interval.saturating_mul(10).max(1),
            saved_once: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether any save has succeeded through this store.
    pub fn saved_once(&self) -> bool {
        self.saved_once
    }

    /// Path of the numbered backup for `episodes`, e.g. `pvp_model_ep100.json`.
    pub fn backup_path(&self, episodes: u64) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".to_string());
        let extension = self
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "json".to_string());
        self.path.with_file_name(format!("{}_ep{}.{}", stem, episodes, extension))
    }

    /// Write `checkpoint`, plus a numbered backup when one is due. Returns the backup
    /// path when one was written.
    ///
    /// A checkpoint whose agent would not load back is rejected before anything is
    /// written, so the previous file stays intact.
    pub fn save(&mut self, checkpoint: &Checkpoint) -> Result<Option<PathBuf>> {
        checkpoint.agent.validate()?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.is_dir() {
                fs::create_dir_all(dir).map_err(|source| DuelistError::StorageUnavailable {
                    path: dir.to_path_buf(),
                    source,
                })?;
                info!(dir = %dir.display(), "created checkpoint directory");
            }
        }

        let json = serde_json::to_string_pretty(checkpoint)?;
        write_atomically(&self.path, &json)?;
        self.saved_once = true;

        if checkpoint.total_episodes > 0 && checkpoint.total_episodes % self.backup_interval == 0 {
            let backup = self.backup_path(checkpoint.total_episodes);
            write_atomically(&backup, &json)?;
            return Ok(Some(backup));
        }
        Ok(None)
    }

    /// Read the checkpoint, or `None` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;
        checkpoint.agent.validate()?;
        Ok(Some(checkpoint))
    }
}

fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
