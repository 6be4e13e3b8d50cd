//! Configuration types for the trigger engine
//!
//! These types define the structure of engine configurations loaded from TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Result, TriggerError};

fn default_max_events_per_advance() -> usize {
    10_000
}

fn default_script_prefixes() -> Vec<String> {
    vec!["scripts/".to_string(), "map_scripts/".to_string()]
}

fn default_true() -> bool {
    true
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on deliveries in a single `advance()`; events caused by
    /// events beyond this bound wait for the next advance
    #[serde(default = "default_max_events_per_advance")]
    pub max_events_per_advance: usize,
    /// Prefixes a script action's file name must start with
    #[serde(default = "default_script_prefixes")]
    pub script_prefixes: Vec<String>,
    /// Event names accepted in addition to the built-in ones
    #[serde(default)]
    pub extra_event_names: Vec<String>,
    /// Reject queued events whose name was never declared
    #[serde(default = "default_true")]
    pub strict_event_names: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events_per_advance: default_max_events_per_advance(),
            script_prefixes: default_script_prefixes(),
            extra_event_names: Vec::new(),
            strict_event_names: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TriggerError::Config(e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Whether `file` is an acceptable script location
    pub fn is_allowed_script_file(&self, file: &str) -> bool {
        self.script_prefixes.iter().any(|p| file.starts_with(p.as_str()))
    }
}
