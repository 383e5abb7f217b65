use std::fs;
use std::path::Path;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// User preferences that survive across sessions
///
/// Loaded once at startup and saved whenever the user changes them. The
/// submission front end reads them and passes the values down explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Forward finished files to the delivery sink
    pub send_to_telegram: bool,
}

impl Preferences {
    /// Load preferences, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No preferences at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse preferences: {}", path.display()))
    }

    /// Persist preferences, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create preferences directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize preferences")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write preferences: {}", path.display()))?;
        debug!("Saved preferences to {}", path.display());
        Ok(())
    }
}
