use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_TIME_LIMIT_SECONDS: f32 = 600.0;
const DEFAULT_BALANCE_THRESHOLD_PCT: f32 = 0.8;
const DEFAULT_ACCUMULATION_THRESHOLD_PCT: f32 = 0.5;
const DEFAULT_MISSING_ITEMS_THRESHOLD: usize = 10;
const DEFAULT_END_SCREEN_SECONDS: f32 = 5.0;
const DEFAULT_GOOD_ENDING_SCENE: &str = "GoodEndingScene";
const DEFAULT_BAD_ENDING_SCENE: &str = "BadEndingScene";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse config json: {0}")]
    Parse(String),
    #[error("config validation failed at {field}: expected {expected}, got {actual}")]
    Invalid {
        field: &'static str,
        expected: &'static str,
        actual: String,
    },
}

/// Rule-engine configuration, fixed at construction and never re-read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Countdown length in seconds.
    #[serde(default = "default_time_limit_seconds")]
    pub time_limit_seconds: f32,
    /// Fraction of the positive memory pool the balance must reach.
    #[serde(default = "default_balance_threshold_pct")]
    pub balance_threshold_pct: f32,
    /// Fraction of the absolute memory pool the accumulation must stay under.
    #[serde(default = "default_accumulation_threshold_pct")]
    pub accumulation_threshold_pct: f32,
    /// Remaining count at or below which the missing-items list is published.
    #[serde(default = "default_missing_items_threshold")]
    pub missing_items_threshold: usize,
    /// Elapsed tick time between conclusion and the scene-change request.
    #[serde(default = "default_end_screen_seconds")]
    pub end_screen_seconds: f32,
    #[serde(default = "default_good_ending_scene")]
    pub good_ending_scene: String,
    #[serde(default = "default_bad_ending_scene")]
    pub bad_ending_scene: String,
}

fn default_time_limit_seconds() -> f32 {
    DEFAULT_TIME_LIMIT_SECONDS
}

fn default_balance_threshold_pct() -> f32 {
    DEFAULT_BALANCE_THRESHOLD_PCT
}

fn default_accumulation_threshold_pct() -> f32 {
    DEFAULT_ACCUMULATION_THRESHOLD_PCT
}

fn default_missing_items_threshold() -> usize {
    DEFAULT_MISSING_ITEMS_THRESHOLD
}

fn default_end_screen_seconds() -> f32 {
    DEFAULT_END_SCREEN_SECONDS
}

fn default_good_ending_scene() -> String {
    DEFAULT_GOOD_ENDING_SCENE.to_string()
}

fn default_bad_ending_scene() -> String {
    DEFAULT_BAD_ENDING_SCENE.to_string()
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            time_limit_seconds: default_time_limit_seconds(),
            balance_threshold_pct: default_balance_threshold_pct(),
            accumulation_threshold_pct: default_accumulation_threshold_pct(),
            missing_items_threshold: default_missing_items_threshold(),
            end_screen_seconds: default_end_screen_seconds(),
            good_ending_scene: default_good_ending_scene(),
            bad_ending_scene: default_bad_ending_scene(),
        }
    }
}

impl RulesConfig {
    /// Parses a config from JSON, reporting the offending path on malformed
    /// input, then validates it.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config: Self = match serde_path_to_error::deserialize(&mut deserializer) {
            Ok(config) => config,
            Err(error) => {
                let path = error.path().to_string();
                let source = error.into_inner();
                return Err(if path.is_empty() || path == "." {
                    ConfigError::Parse(source.to_string())
                } else {
                    ConfigError::Parse(format!("at {path}: {source}"))
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_limit_seconds.is_finite() || self.time_limit_seconds <= 0.0 {
            return Err(Self::invalid(
                "time_limit_seconds",
                "finite number > 0",
                self.time_limit_seconds,
            ));
        }
        if !self.end_screen_seconds.is_finite() || self.end_screen_seconds < 0.0 {
            return Err(Self::invalid(
                "end_screen_seconds",
                "finite number >= 0",
                self.end_screen_seconds,
            ));
        }
        if !self.balance_threshold_pct.is_finite()
            || !(0.0..=1.0).contains(&self.balance_threshold_pct)
        {
            return Err(Self::invalid(
                "balance_threshold_pct",
                "fraction in 0..=1",
                self.balance_threshold_pct,
            ));
        }
        if !self.accumulation_threshold_pct.is_finite()
            || !(0.0..=1.0).contains(&self.accumulation_threshold_pct)
        {
            return Err(Self::invalid(
                "accumulation_threshold_pct",
                "fraction in 0..=1",
                self.accumulation_threshold_pct,
            ));
        }
        if self.good_ending_scene.is_empty() {
            return Err(Self::invalid(
                "good_ending_scene",
                "non-empty scene name",
                "\"\"",
            ));
        }
        if self.bad_ending_scene.is_empty() {
            return Err(Self::invalid(
                "bad_ending_scene",
                "non-empty scene name",
                "\"\"",
            ));
        }
        Ok(())
    }

    fn invalid(
        field: &'static str,
        expected: &'static str,
        actual: impl std::fmt::Display,
    ) -> ConfigError {
        ConfigError::Invalid {
            field,
            expected,
            actual: actual.to_string(),
        }
    }
}
