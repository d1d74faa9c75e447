use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::attachments::{AttachmentPolicy, DEFAULT_ACCEPTED_EXTENSIONS};
use crate::generator::{CannedResponder, DEFAULT_DELAY_MS, DEFAULT_REPLY};
use crate::store::TitleRule;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name the assistant signs its messages with
    pub bot_name: String,

    /// Title of a conversation before its first message
    pub placeholder_title: String,

    /// Characters of the first message kept in a conversation title
    pub title_max_chars: usize,

    /// Appended to titles that were cut short
    pub title_marker: String,

    /// Canned responder settings
    pub responder: ResponderConfig,

    /// Attachment staging rules
    pub attachments: AttachmentConfig,

    /// UI preferences
    pub ui: UiConfig,

    /// Directory holding the config file and log
    #[serde(skip)]
    pub home: PathBuf,
}

/// Canned responder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub delay_ms: u64,
    pub reply: String,
}

/// Attachment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    pub max_count: Option<usize>,
    pub max_total_bytes: Option<u64>,
    /// Empty list accepts every file type
    pub accepted_extensions: Vec<String>,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Terminals narrower than this hide the sidebar
    pub narrow_width: u16,
    /// Redraw interval in milliseconds
    pub tick_ms: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot_name: "Justice Bot".to_string(),
            placeholder_title: "New Chat".to_string(),
            title_max_chars: 30,
            title_marker: "...".to_string(),
            responder: ResponderConfig::default(),
            attachments: AttachmentConfig::default(),
            ui: UiConfig::default(),
            home: default_home(),
        }
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            reply: DEFAULT_REPLY.to_string(),
        }
    }
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_count: None,
            max_total_bytes: None,
            accepted_extensions: DEFAULT_ACCEPTED_EXTENSIONS.clone(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            narrow_width: 100,
            tick_ms: 100,
            log_level: "info".to_string(),
        }
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".justice-bot")
}

impl Config {
    /// Load configuration from `path`, or from `~/.justice-bot/config.toml`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => default_home().join("config.toml"),
        };

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.home = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(default_home);

        Ok(config)
    }

    /// Save configuration into the home directory
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home)
            .context("Failed to create .justice-bot directory")?;
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(self.config_path(), content)
            .context("Failed to write config file")?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    pub fn log_path(&self) -> PathBuf {
        self.home.join("justice-bot.log")
    }

    pub fn title_rule(&self) -> TitleRule {
        TitleRule {
            placeholder: self.placeholder_title.clone(),
            max_chars: self.title_max_chars,
            marker: self.title_marker.clone(),
        }
    }

    pub fn attachment_policy(&self) -> AttachmentPolicy {
        AttachmentPolicy {
            max_count: self.attachments.max_count,
            max_total_bytes: self.attachments.max_total_bytes,
        }
    }

    pub fn responder(&self) -> CannedResponder {
        CannedResponder::new(
            Duration::from_millis(self.responder.delay_ms),
            self.responder.reply.clone(),
        )
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.ui.tick_ms.max(10))
    }
}
