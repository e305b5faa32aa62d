use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{DuelistError, Result};

/// Aggregate outcome of one episode across all arenas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    /// Mean episode reward over all combatants.
    pub total_reward: f32,
    /// Kills scored by all combatants during the episode.
    pub total_kills: u32,
    pub step_count: usize,
}

/// Averages over the most recent episodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecentPerformance {
    pub episodes: usize,
    pub avg_reward: f32,
    pub avg_kills: f32,
    pub avg_length: f32,
}

/// Bounded per-episode history kept in three parallel lists.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeHistory {
    rewards: VecDeque<f32>,
    kills: VecDeque<u32>,
    lengths: VecDeque<usize>,
    history_size: usize,
}

impl EpisodeHistory {
    pub fn new(history_size: usize) -> Self {
        EpisodeHistory {
            rewards: VecDeque::with_capacity(history_size),
            kills: VecDeque::with_capacity(history_size),
            lengths: VecDeque::with_capacity(history_size),
            history_size,
        }
    }

    /// Rebuild a history from stored lists, keeping only the newest `history_size` entries.
    pub fn from_lists(
        rewards: Vec<f32>,
        kills: Vec<u32>,
        lengths: Vec<usize>,
        history_size: usize,
    ) -> Result<Self> {
        if rewards.len() != kills.len() || rewards.len() != lengths.len() {
            return Err(DuelistError::InvalidCheckpoint(format!(
                "history lists differ in length: {} rewards, {} kills, {} lengths",
                rewards.len(),
                kills.len(),
                lengths.len()
            )));
        }
        let mut history = EpisodeHistory::new(history_size);
        for ((reward, kills), length) in rewards.into_iter().zip(kills).zip(lengths) {
            history.record(EpisodeStats {
                total_reward: reward,
                total_kills: kills,
                step_count: length,
            });
        }
        Ok(history)
    }

    /// Append an episode, dropping the oldest once full.
    pub fn record(&mut self, stats: EpisodeStats) {
        if self.history_size == 0 {
            return;
        }
        if self.rewards.len() >= self.history_size {
            self.rewards.pop_front();
            self.kills.pop_front();
            self.lengths.pop_front();
        }
        self.rewards.push_back(stats.total_reward);
        self.kills.push_back(stats.total_kills);
        self.lengths.push_back(stats.step_count);
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn rewards(&self) -> Vec<f32> {
        self.rewards.iter().copied().collect()
    }

    pub fn kills(&self) -> Vec<u32> {
        self.kills.iter().copied().collect()
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.lengths.iter().copied().collect()
    }

    pub fn last(&self) -> Option<EpisodeStats> {
        Some(EpisodeStats {
            total_reward: *self.rewards.back()?,
            total_kills: *self.kills.back()?,
            step_count: *self.lengths.back()?,
        })
    }

    /// Averages over the last `window` episodes.
    pub fn recent(&self, window: usize) -> Option<RecentPerformance> {
        let n = window.min(self.len());
        if n == 0 {
            return None;
        }
        let avg_reward = self.rewards.iter().rev().take(n).sum::<f32>() / n as f32;
        let avg_kills = self.kills.iter().rev().take(n).map(|&k| k as f32).sum::<f32>() / n as f32;
        let avg_length = self.lengths.iter().rev().take(n).map(|&l| l as f32).sum::<f32>() / n as f32;
        Some(RecentPerformance {
            episodes: n,
            avg_reward,
            avg_kills,
            avg_length,
        })
    }

    pub fn best_reward(&self) -> Option<f32> {
        self.rewards.iter().copied().reduce(f32::max)
    }

    pub fn most_kills(&self) -> Option<u32> {
        self.kills.iter().copied().max()
    }

    /// Shortest episode in which at least one kill was scored.
    pub fn fastest_kill(&self) -> Option<usize> {
        self.lengths
            .iter()
            .zip(self.kills.iter())
            .filter(|(_, kills)| **kills > 0)
            .map(|(&length, _)| length)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(reward: f32, kills: u32, steps: usize) -> EpisodeStats {
        EpisodeStats {
            total_reward: reward,
            total_kills: kills,
            step_count: steps,
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = EpisodeHistory::new(3);
        for i in 0..5 {
            history.record(stats(i as f32, 0, i));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.rewards(), vec![2.0, 3.0, 4.0]);
        assert_eq!(history.lengths(), vec![2, 3, 4]);
    }

    #[test]
    fn test_queries() {
        let mut history = EpisodeHistory::new(10);
        assert!(history.recent(10).is_none());
        assert!(history.fastest_kill().is_none());

        history.record(stats(-10.0, 0, 600));
        history.record(stats(40.0, 2, 250));
        history.record(stats(12.0, 1, 120));

        assert_eq!(history.best_reward(), Some(40.0));
        assert_eq!(history.most_kills(), Some(2));
        assert_eq!(history.fastest_kill(), Some(120));

        let recent = history.recent(2).unwrap();
        assert_eq!(recent.episodes, 2);
        assert_eq!(recent.avg_reward, 26.0);
        assert_eq!(recent.avg_kills, 1.5);
        assert_eq!(recent.avg_length, 185.0);
    }

    #[test]
    fn test_from_lists_truncates_and_checks_lengths() {
        let history = EpisodeHistory::from_lists(
            vec![1.0, 2.0, 3.0],
            vec![0, 1, 0],
            vec![10, 20, 30],
            2,
        )
        .unwrap();
        assert_eq!(history.rewards(), vec![2.0, 3.0]);
        assert_eq!(history.last(), Some(stats(3.0, 0, 30)));

        assert!(EpisodeHistory::from_lists(vec![1.0], vec![], vec![1], 10).is_err());
    }
}
