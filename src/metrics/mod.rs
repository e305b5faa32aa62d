pub mod tracker;

pub use tracker::{EpisodeHistory, EpisodeStats, RecentPerformance};
