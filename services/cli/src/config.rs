use botline_core::{BotConfig, InitOptions};
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Command line arguments of the terminal client.
#[derive(Parser, Debug, Clone)]
#[command(name = "botline")]
#[command(version, about = "Talk to a conversational bot from the terminal", long_about = None)]
pub struct Cli {
    /// Application key of the bot to talk to
    #[arg(long)]
    pub bot_id: String,

    /// Conversation language, used when no voice implies one
    #[arg(long, default_value = "en")]
    pub language: String,

    /// Input sent automatically when the session is ready
    #[arg(long, default_value = "#intro")]
    pub start_message: String,

    /// Show signal inputs such as `#intro` in the transcript
    #[arg(long)]
    pub no_mask: bool,

    /// Directory for the per-client diagnostic log files
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

impl Cli {
    pub fn init_options(&self, auth_token: Option<String>) -> InitOptions {
        let mut options = InitOptions::new(self.bot_id.clone());
        options.language = self.language.clone();
        options.start_message = self.start_message.clone();
        options.mask_signals = !self.no_mask;
        options.auth_token = auth_token;
        options
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub device_id: String,
    pub token: Option<String>,
    pub zone_id: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let base_url = std::env::var("BOTLINE_URL")
            .unwrap_or_else(|_| "https://core.flowstorm.ai".to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "BOTLINE_URL".to_string(),
                format!("'{}' is not an http(s) URL", base_url),
            ));
        }

        let device_id =
            std::env::var("BOTLINE_DEVICE_ID").unwrap_or_else(|_| "sender".to_string());
        if device_id.trim().is_empty() {
            return Err(ConfigError::MissingVar(
                "BOTLINE_DEVICE_ID must not be empty".to_string(),
            ));
        }

        let token = std::env::var("BOTLINE_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());

        let zone_id = std::env::var("TZ").unwrap_or_else(|_| "UTC".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            base_url,
            device_id,
            token,
            zone_id,
            log_level,
        })
    }

    pub fn bot_config(&self) -> BotConfig {
        let mut config = BotConfig::new(self.base_url.clone());
        config.device_id = self.device_id.clone();
        config.zone_id = self.zone_id.clone();
        config
    }
}
