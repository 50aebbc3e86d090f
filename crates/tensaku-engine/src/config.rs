//! Engine configuration, loaded from RON.
//!
//! ```ron
//! (
//!     wrap_navigation: true,
//!     history_limit: 64,
//!     line_diff_algorithm: patience,
//!     cell_separator: "#%%",
//! )
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tensaku_diff::LineDiffAlgorithm;

/// Tunables for a [`Reconciler`](crate::Reconciler).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether next/previous wrap around at the ends of the change list.
    pub wrap_navigation: bool,
    /// Maximum number of undo checkpoints kept per session.
    pub history_limit: usize,
    /// Algorithm used by the in-process diff service.
    pub line_diff_algorithm: LineDiffAlgorithm,
    /// Capacity of the session event channel.
    pub event_capacity: usize,
    /// Line prefix that starts a new cell in whole-document text.
    pub cell_separator: String,
    /// Upper bound for the rewrite ratio until the last batch arrives.
    pub streaming_ratio_cap: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wrap_navigation: true,
            history_limit: 64,
            line_diff_algorithm: LineDiffAlgorithm::Myers,
            event_capacity: 256,
            cell_separator: "#%%".to_string(),
            streaming_ratio_cap: 0.95,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from RON text.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cell_separator.trim().is_empty() {
            return Err(ConfigError::Invalid("cell_separator must not be blank".into()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.streaming_ratio_cap) {
            return Err(ConfigError::Invalid(format!(
                "streaming_ratio_cap {} is outside 0..=1",
                self.streaming_ratio_cap
            )));
        }
        Ok(())
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}
