//! Analysis settings, loaded from an optional TOML file.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{InsightsError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Class types left out of every indicator, compared case-insensitively.
    pub excluded_class_types: Vec<String>,
    pub recent_window_days: usize,
    pub stable_tolerance: f64,
    pub ranking_size: usize,
    pub page_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            excluded_class_types: vec!["Aulão".to_string()],
            recent_window_days: 3,
            stable_tolerance: 0.5,
            ranking_size: 5,
            page_size: 8,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("no config file given, using defaults");
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), ?config, "loaded analysis config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recent_window_days == 0 {
            return Err(InsightsError::Config(
                "recent_window_days must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(InsightsError::Config(
                "page_size must be at least 1".to_string(),
            ));
        }
        if !self.stable_tolerance.is_finite() || self.stable_tolerance < 0.0 {
            return Err(InsightsError::Config(format!(
                "stable_tolerance must be a non-negative number, got {}",
                self.stable_tolerance
            )));
        }
        Ok(())
    }
}
