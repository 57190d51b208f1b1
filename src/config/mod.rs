use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `server.base_url`.
pub const SERVER_URL_ENV: &str = "DOCCHAT_SERVER_URL";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocChatConfig {
    /// Where the assistant server lives
    pub server: ServerConfig,

    /// General settings
    pub general: GeneralConfig,

    /// Conversation behaviour
    pub session: SessionConfig,

    /// TUI settings
    pub tui: TuiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,

    /// Whole-request timeout in seconds
    pub timeout_seconds: u64,

    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level
    pub log_level: String,

    /// Log file used while the TUI owns the terminal
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Send back the conversation id the server hands out
    pub resume_conversation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuiConfig {
    /// Auto-scroll chat
    pub auto_scroll: bool,

    /// Show the processed documents sidebar
    pub show_documents: bool,
}

impl DocChatConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.load_env_vars();

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the default configuration path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.toml"))
    }

    fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".docchat"))
    }

    /// Create default configuration
    pub fn default() -> Self {
        let docchat_dir = Self::base_dir().unwrap_or_else(|_| PathBuf::from(".docchat"));

        Self {
            server: ServerConfig {
                base_url: "http://127.0.0.1:5000".to_string(),
                timeout_seconds: 300,
                connect_timeout_seconds: 10,
            },
            general: GeneralConfig {
                log_level: "info".to_string(),
                log_file: docchat_dir.join("docchat.log"),
            },
            session: SessionConfig {
                resume_conversation: true,
            },
            tui: TuiConfig {
                auto_scroll: true,
                show_documents: true,
            },
        }
    }

    fn load_env_vars(&mut self) {
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            if !url.trim().is_empty() {
                self.server.base_url = url.trim().to_string();
            }
        }
    }

    /// Merge with command-line overrides
    pub fn merge_overrides(&mut self, overrides: Vec<(String, String)>) -> Result<()> {
        for (key, value) in overrides {
            match key.as_str() {
                "server" | "base_url" => self.server.base_url = value,
                "timeout" => self.server.timeout_seconds = value.parse()?,
                "connect_timeout" => self.server.connect_timeout_seconds = value.parse()?,
                "log_level" => self.general.log_level = value,
                "log_file" => self.general.log_file = PathBuf::from(value),
                "resume_conversation" => self.session.resume_conversation = value.parse()?,
                "auto_scroll" => self.tui.auto_scroll = value.parse()?,
                "show_documents" => self.tui.show_documents = value.parse()?,
                _ => bail!("Unknown config key: {}", key),
            }
        }
        Ok(())
    }
}

/// Split `key=value` pairs given on the command line.
pub fn parse_override(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected key=value, got '{}'", raw))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

/// Load or create configuration
pub fn load_or_create_config(path: Option<&Path>) -> Result<DocChatConfig> {
    let config_path = if let Some(p) = path {
        p.to_path_buf()
    } else {
        DocChatConfig::default_path()?
    };

    if config_path.exists() {
        DocChatConfig::load(&config_path)
    } else {
        let mut config = DocChatConfig::default();
        config.save(&config_path)?;
        config.load_env_vars();
        Ok(config)
    }
}
