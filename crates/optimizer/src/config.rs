use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default Telegram Bot API endpoint
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Environment variable overriding the configured bot token
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";

/// Environment variable overriding the configured chat id
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

/// Remote delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Base URL of the Bot API (overridable for self-hosted API servers)
    pub api_base: String,
    /// Bot token; delivery is disabled when empty
    pub bot_token: Option<String>,
    /// Target chat or channel id
    pub chat_id: Option<String>,
    /// Caption attached to every uploaded video
    pub caption: String,
    /// Upload timeout in seconds
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: TELEGRAM_API_BASE.to_string(),
            bot_token: None,
            chat_id: None,
            caption: "Video update".to_string(),
            timeout_secs: 600,
        }
    }
}

impl TelegramConfig {
    /// Both token and chat id are present
    pub fn is_configured(&self) -> bool {
        self.bot_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.chat_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// Configuration for the video optimizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Path to the ffprobe binary
    pub ffprobe_bin: PathBuf,
    /// Target video encoder
    pub video_codec: String,
    /// Target audio encoder
    pub audio_codec: String,
    /// Number of concurrent transcodes (only 1 is supported)
    pub workers: usize,
    /// Where the persisted user preferences live
    pub preferences_path: PathBuf,
    pub telegram: TelegramConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl OptimizerConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            workers: 1,
            preferences_path: default_preferences_path(),
            telegram: TelegramConfig::default(),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    ///
    /// Telegram credentials from the environment take precedence over the file.
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // Try JSON first, then TOML
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_BOT_TOKEN).filter(|v| !v.is_empty()) {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat) = lookup(ENV_CHAT_ID).filter(|v| !v.is_empty()) {
            self.telegram.chat_id = Some(chat);
        }
    }
}

fn default_preferences_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("video-optimizer").join("preferences.json")
}
