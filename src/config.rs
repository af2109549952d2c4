//! Layered configuration loading using figment.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. Environment variables (`ER_` prefix, `__` separates sections)
//!
//! `ER_MATCHING__MAX_CANDIDATES=25` maps to `matching.max_candidates`.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ER_";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// An explicitly requested config file does not exist.
    #[error("Configuration file not found: {}", path.display())]
    MissingFile {
        /// Path that was requested.
        path: PathBuf,
    },

    /// The merged configuration failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// Matching thresholds and toggles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum name similarity for a fuzzy candidate to survive.
    pub name_similarity_threshold: f64,
    /// Address similarity at which the field counts as matched.
    pub address_similarity_threshold: f64,
    /// Phone similarity at which the field counts as matched.
    pub phone_similarity_threshold: f64,
    /// Email similarity at which the field counts as matched.
    pub email_similarity_threshold: f64,
    /// Candidates scoring below this are never reported.
    pub overall_similarity_threshold: f64,
    /// Upper bound on ranked candidates returned per query.
    pub max_candidates: usize,
    /// Use Levenshtein and token overlap for names.
    pub fuzzy_matching_enabled: bool,
    /// Use Soundex and Metaphone codes for names.
    pub phonetic_matching_enabled: bool,
    /// Restrict scoring to candidates sharing a blocking key.
    pub blocking_enabled: bool,
    /// Number of leading characters of the standardized name used as the block key.
    pub blocking_key_size: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            name_similarity_threshold: 0.8,
            address_similarity_threshold: 0.85,
            phone_similarity_threshold: 0.9,
            email_similarity_threshold: 0.95,
            overall_similarity_threshold: 0.75,
            max_candidates: 100,
            fuzzy_matching_enabled: true,
            phonetic_matching_enabled: true,
            blocking_enabled: true,
            blocking_key_size: 3,
        }
    }
}

/// Decision policy and resolver resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Best score at or above which an observation merges into an existing entity.
    pub auto_merge_threshold: f64,
    /// Requests per chunk; cancellation is checked between chunks.
    pub batch_size: usize,
    /// Bounded queue between the resolver and the graph/event dispatcher.
    pub side_effect_queue_capacity: usize,
    /// Number of key lock stripes.
    pub lock_stripes: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            auto_merge_threshold: 0.9,
            batch_size: 100,
            side_effect_queue_capacity: 1024,
            lock_stripes: 64,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default `tracing_subscriber` formatter.
    #[default]
    Full,
    /// Single-line output.
    Compact,
    /// Multi-line, human-oriented output.
    Pretty,
}

/// Logging settings consumed by the binary's subscriber setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `ER_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

/// Complete resolver configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Scoring and blocking.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Merge decision, batching and concurrency.
    #[serde(default)]
    pub resolution: ResolutionConfig,
    /// CLI logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Build the figment provider chain.
    ///
    /// Public so callers can layer extra providers on top.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration from defaults, `file` and the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] when `file` is given but absent,
    /// [`ConfigError::Figment`] on malformed input, and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::MissingFile {
                    path: path.to_path_buf(),
                });
            }
        }

        let config: Self = Self::figment(file).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every threshold lies in [0, 1] and every count is non-zero.
    ///
    /// # Errors
    ///
    /// Returns the first offending setting.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let m = &self.matching;
        let r = &self.resolution;

        for (name, value) in [
            ("name_similarity_threshold", m.name_similarity_threshold),
            ("address_similarity_threshold", m.address_similarity_threshold),
            ("phone_similarity_threshold", m.phone_similarity_threshold),
            ("email_similarity_threshold", m.email_similarity_threshold),
            ("overall_similarity_threshold", m.overall_similarity_threshold),
            ("auto_merge_threshold", r.auto_merge_threshold),
        ] {
            check_threshold(name, value)?;
        }

        for (name, value) in [
            ("max_candidates", m.max_candidates),
            ("blocking_key_size", m.blocking_key_size),
            ("batch_size", r.batch_size),
            ("side_effect_queue_capacity", r.side_effect_queue_capacity),
            ("lock_stripes", r.lock_stripes),
        ] {
            if value == 0 {
                return Err(ValidationError::ZeroSetting { name });
            }
        }

        Ok(())
    }
}

/// Rejects values outside [0, 1], NaN included.
pub(crate) fn check_threshold(name: &'static str, value: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::ThresholdOutOfRange { name, value })
    }
}
