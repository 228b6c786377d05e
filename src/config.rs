//! Board policy configuration.
//!
//! Loaded from a YAML file with serde defaults for every field, so an
//! absent or partial file yields the legacy behavior.

use crate::guard::EditPolicy;
use crate::types::TaskVisibility;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "ROCKBOARD_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Who may edit or delete a visible task.
    #[serde(default)]
    pub edit_policy: EditPolicy,

    /// Visibility applied when a task is created without one.
    #[serde(default = "default_task_visibility")]
    pub default_task_visibility: TaskVisibility,

    /// Name of the category tasks fall back to when theirs is deleted.
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            edit_policy: EditPolicy::default(),
            default_task_visibility: default_task_visibility(),
            fallback_category: default_fallback_category(),
        }
    }
}

fn default_task_visibility() -> TaskVisibility {
    // A freshly created task is hidden from everyone without a grant.
    TaskVisibility::Private
}

fn default_fallback_category() -> String {
    "Other".to_string()
}

impl BoardConfig {
    /// Load from an explicit YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Discover and load configuration.
    ///
    /// Order: `ROCKBOARD_CONFIG_PATH`, then `rockboard.yaml` in the working
    /// directory, then `~/.rockboard/config.yaml`, then embedded defaults.
    pub fn discover() -> Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load(&PathBuf::from(explicit));
        }

        let project_file = PathBuf::from("rockboard.yaml");
        if project_file.exists() {
            return Self::load(&project_file);
        }

        if let Some(home) = dirs::home_dir() {
            let user_file = home.join(".rockboard").join("config.yaml");
            if user_file.exists() {
                return Self::load(&user_file);
            }
        }

        debug!("no config file found, using defaults");
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_legacy_behavior() {
        let config = BoardConfig::default();
        assert_eq!(config.edit_policy, EditPolicy::AnyVisible);
        assert_eq!(config.default_task_visibility, TaskVisibility::Private);
        assert_eq!(config.fallback_category, "Other");
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: BoardConfig = serde_yaml::from_str("edit_policy: restricted\n").unwrap();
        assert_eq!(config.edit_policy, EditPolicy::Restricted);
        assert_eq!(config.default_task_visibility, TaskVisibility::Private);
        assert_eq!(config.fallback_category, "Other");
    }
}
