//! Persistent preferences: the last organized directory and the default
//! extensions and conflict policy.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::file_utils::{ConflictPolicy, DEFAULT_EXTENSIONS};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub last_directory: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub overwrite: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_directory: None,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            overwrite: false,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "apkorg").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Loads the config at `path`; a missing or unreadable file yields the
    /// defaults.
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No config at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Conflict policy for a run: `--overwrite` or a saved `overwrite: true`
    /// both replace existing files.
    pub fn conflict_policy(&self, overwrite_flag: bool) -> ConflictPolicy {
        if overwrite_flag || self.overwrite {
            ConflictPolicy::Overwrite
        } else {
            ConflictPolicy::Skip
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write config {}", path.display()))?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }
}
