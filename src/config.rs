use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::leaderboard::LeaderboardSort;

pub const DEFAULT_POSITIVE_LABEL: &str = "called_strike";
pub const DEFAULT_NEGATIVE_LABEL: &str = "ball";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Qualifying volume is `events_per_episode_threshold * episodes_in_season`.
    pub events_per_episode_threshold: u32,
    pub episodes_in_season: u32,
    pub edge_midpoint: f64,
    pub positive_label: String,
    pub negative_label: String,
    pub max_balls: u8,
    /// Worker threads for the partitioned passes; 0 uses the rayon default.
    pub threads: usize,
    pub leaderboard: LeaderboardSort,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            events_per_episode_threshold: 6,
            episodes_in_season: 162,
            edge_midpoint: 0.5,
            positive_label: DEFAULT_POSITIVE_LABEL.to_string(),
            negative_label: DEFAULT_NEGATIVE_LABEL.to_string(),
            max_balls: 3,
            threads: 0,
            leaderboard: LeaderboardSort::default(),
        }
    }
}

impl EngineConfig {
    pub fn volume_threshold(&self) -> u64 {
        u64::from(self.events_per_episode_threshold) * u64::from(self.episodes_in_season)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&self.edge_midpoint) {
            return Err(EngineError::InvalidConfig(format!(
                "edge_midpoint {} outside [0, 1]",
                self.edge_midpoint
            )));
        }
        let pos = self.positive_label.trim();
        let neg = self.negative_label.trim();
        if pos.is_empty() || neg.is_empty() {
            return Err(EngineError::InvalidConfig(
                "outcome labels must be non-empty".to_string(),
            ));
        }
        if pos == neg {
            return Err(EngineError::InvalidConfig(format!(
                "positive and negative labels are both {pos:?}"
            )));
        }
        if self.max_balls == 0 {
            return Err(EngineError::InvalidConfig(
                "max_balls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("read config {}", path.display()))?;
                serde_json::from_str::<EngineConfig>(&raw)
                    .with_context(|| format!("parse config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u32>("STATCAST_VOLUME_PER_GAME") {
            self.events_per_episode_threshold = v;
        }
        if let Some(v) = env_parse::<u32>("STATCAST_GAMES") {
            self.episodes_in_season = v;
        }
        if let Some(v) = env_parse::<f64>("STATCAST_EDGE_MIDPOINT") {
            self.edge_midpoint = v;
        }
        if let Some(v) = env_string("STATCAST_POSITIVE_LABEL") {
            self.positive_label = v;
        }
        if let Some(v) = env_string("STATCAST_NEGATIVE_LABEL") {
            self.negative_label = v;
        }
        if let Some(v) = env_parse::<u8>("STATCAST_MAX_BALLS") {
            self.max_balls = v;
        }
        if let Some(v) = env_parse::<usize>("STATCAST_THREADS") {
            self.threads = v;
        }
    }

    pub fn with_pool<T>(&self, action: impl FnOnce() -> T + Send) -> T
    where
        T: Send,
    {
        if self.threads == 0 {
            return action();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
        {
            Ok(pool) => pool.install(action),
            Err(err) => {
                log::warn!("thread pool with {} workers failed: {err}", self.threads);
                action()
            }
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.parse::<T>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::SortOrder;

    #[test]
    fn defaults_match_observed_season() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.volume_threshold(), 972);
        assert_eq!(cfg.edge_midpoint, 0.5);
        assert_eq!(cfg.max_balls, 3);
        assert_eq!(cfg.leaderboard.run_value, SortOrder::Asc);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_midpoint_and_labels() {
        let cfg = EngineConfig {
            edge_midpoint: 1.5,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = EngineConfig {
            negative_label: "called_strike".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"edge_midpoint":0.4,"episodes_in_season":60}"#).unwrap();
        assert_eq!(cfg.edge_midpoint, 0.4);
        assert_eq!(cfg.volume_threshold(), 360);
        assert_eq!(cfg.positive_label, "called_strike");
    }

    const OVERRIDES: [(&str, &str); 7] = [
        ("STATCAST_VOLUME_PER_GAME", "4"),
        ("STATCAST_GAMES", "30"),
        ("STATCAST_EDGE_MIDPOINT", "0.45"),
        ("STATCAST_POSITIVE_LABEL", " strike "),
        ("STATCAST_NEGATIVE_LABEL", "ball"),
        ("STATCAST_MAX_BALLS", "4"),
        ("STATCAST_THREADS", "not-a-number"),
    ];

    // Only test that touches STATCAST_* variables.
    #[test]
    fn env_overrides_apply_and_are_validated() {
        for (key, value) in OVERRIDES {
            unsafe { env::set_var(key, value) };
        }
        let mut cfg = EngineConfig::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.volume_threshold(), 120);
        assert_eq!(cfg.edge_midpoint, 0.45);
        assert_eq!(cfg.positive_label, "strike");
        assert_eq!(cfg.max_balls, 4);
        assert_eq!(cfg.threads, 0);
        assert!(cfg.validate().is_ok());

        unsafe { env::set_var("STATCAST_EDGE_MIDPOINT", "nan") };
        let mut bad = EngineConfig::default();
        bad.apply_env_overrides();
        assert!(bad.edge_midpoint.is_nan());
        assert!(matches!(bad.validate(), Err(EngineError::InvalidConfig(_))));

        unsafe { env::set_var("STATCAST_POSITIVE_LABEL", "ball") };
        unsafe { env::set_var("STATCAST_EDGE_MIDPOINT", "0.5") };
        let mut same = EngineConfig::default();
        same.apply_env_overrides();
        assert!(same.validate().is_err());

        for (key, _) in OVERRIDES {
            unsafe { env::remove_var(key) };
        }
        let mut clean = EngineConfig::default();
        clean.apply_env_overrides();
        assert_eq!(clean, EngineConfig::default());
    }
}
