//! Engine configuration.
//!
//! Loaded from TOML, then adjusted by environment overrides:
//!
//! ```toml
//! backstop_threshold = 0.6
//! model_id = "extractor-v2"
//! statement_policy = "prefer_existing"
//! correction_policy = "last_write"
//! undo_depth = 20
//!
//! [prefilter]
//! drop_not_provided = true
//! ```

use crate::backstop::DEFAULT_BACKSTOP_THRESHOLD;
use crate::merge::MergePolicy;
use crate::prefilter::PrefilterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const ENV_BACKSTOP_MIN_CONF: &str = "ARBOR_BACKSTOP_MIN_CONF";
pub const ENV_MODEL_ID: &str = "ARBOR_MODEL_ID";

pub const DEFAULT_UNDO_DEPTH: usize = 20;
pub const MAX_UNDO_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("backstop threshold must be a finite number in [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("undo depth must be between 1 and {max}, got {0}", max = MAX_UNDO_DEPTH)]
    InvalidUndoDepth(usize),

    #[error("{var} is not a number: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Minimum backstop confidence for accepting a routing guess.
    pub backstop_threshold: f64,
    /// Recorded in provenance when the extractor does not name its model.
    pub model_id: String,
    pub statement_policy: MergePolicy,
    pub correction_policy: MergePolicy,
    /// Number of state-changing turns that can be undone.
    pub undo_depth: usize,
    pub prefilter: PrefilterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backstop_threshold: DEFAULT_BACKSTOP_THRESHOLD,
            model_id: "unspecified".to_string(),
            statement_policy: MergePolicy::PreferExisting,
            correction_policy: MergePolicy::LastWrite,
            undo_depth: DEFAULT_UNDO_DEPTH,
            prefilter: PrefilterConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.backstop_threshold = threshold;
        self
    }

    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from any variable source.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(ENV_BACKSTOP_MIN_CONF) {
            self.backstop_threshold =
                raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: ENV_BACKSTOP_MIN_CONF,
                    value: raw.clone(),
                })?;
        }
        if let Some(model) = lookup(ENV_MODEL_ID) {
            if !model.trim().is_empty() {
                self.model_id = model.trim().to_string();
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.backstop_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::InvalidThreshold(t));
        }
        if !(1..=MAX_UNDO_DEPTH).contains(&self.undo_depth) {
            return Err(ConfigError::InvalidUndoDepth(self.undo_depth));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
