//! # Application Configuration
//!
//! All settings come from environment variables (a `.env` file is loaded by
//! the binary first). Each section validates itself; [`AppConfig::validate`]
//! runs them all before anything connects.

use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use chrono::Offset;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Bot-specific configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token
    pub token: String,
    /// HTTP client timeout in seconds
    pub http_timeout_secs: u64,
    /// Public HTTPS URL Telegram posts updates to; long polling when unset
    pub webhook_url: Option<String>,
    /// Local port the webhook listener binds
    pub webhook_listen_port: u16,
    /// Shared secret guarding the webhook setup endpoint
    pub admin_secret: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            http_timeout_secs: 30,
            webhook_url: None,
            webhook_listen_port: 8443,
            admin_secret: None,
        }
    }
}

impl BotConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.token.trim().is_empty() {
            return Err(AppError::Config("Bot token cannot be empty".to_string()));
        }

        let parts: Vec<&str> = self.token.split(':').collect();
        if parts.len() != 2 {
            return Err(AppError::Config(
                "Bot token format is invalid. Expected format: 'bot_id:bot_token'".to_string(),
            ));
        }
        if parts[0].parse::<u64>().is_err() {
            return Err(AppError::Config("Bot token bot ID must be numeric".to_string()));
        }
        if parts[1].len() < 20 {
            return Err(AppError::Config(
                "Bot token appears to be too short. Please verify it's a valid token".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("HTTP timeout cannot be 0".to_string()));
        }
        if self.http_timeout_secs > 300 {
            return Err(AppError::Config(
                "HTTP timeout cannot be greater than 300 seconds".to_string(),
            ));
        }

        if let Some(url) = &self.webhook_url {
            if !url.starts_with("https://") {
                return Err(AppError::Config(
                    "WEBHOOK_URL must be an https:// URL".to_string(),
                ));
            }
            if reqwest::Url::parse(url).is_err() {
                return Err(AppError::Config(format!("WEBHOOK_URL is not a valid URL: {}", url)));
            }
        }

        if self.webhook_listen_port == 0 {
            return Err(AppError::Config("Webhook listen port cannot be 0".to_string()));
        }

        if let Some(secret) = &self.admin_secret {
            if secret.len() < 16 {
                return Err(AppError::Config(
                    "ADMIN_SECRET must be at least 16 characters".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Database configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; in-process storage when unset
    pub url: Option<String>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(url) = &self.url {
            if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                return Err(AppError::Config(
                    "Database URL must start with 'postgresql://' or 'postgres://'".to_string(),
                ));
            }
            let connection_part = url.split_once("://").map(|(_, rest)| rest).unwrap_or("");
            if !connection_part.contains('@') {
                return Err(AppError::Config(
                    "Database URL must contain authentication information".to_string(),
                ));
            }
        }

        if self.max_connections == 0 {
            return Err(AppError::Config("Max connections cannot be 0".to_string()));
        }
        if self.max_connections > 100 {
            return Err(AppError::Config(
                "Max connections cannot be greater than 100".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 300 {
            return Err(AppError::Config(
                "Connect timeout must be between 1 and 300 seconds".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_persistent(&self) -> bool {
        self.url.is_some()
    }
}

/// Admin server (health, metrics, webhook setup)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub health_port: u16,
    /// Whether to allow privileged ports (< 1024)
    pub allow_privileged_ports: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            health_port: 8080,
            allow_privileged_ports: false,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.health_port == 0 {
            return Err(AppError::Config("Health port cannot be 0".to_string()));
        }
        if !self.allow_privileged_ports && self.health_port < 1024 {
            return Err(AppError::Config(format!(
                "Health port {} is privileged. Set ALLOW_PRIVILEGED_PORTS=true or use port >= 1024",
                self.health_port
            )));
        }
        Ok(())
    }
}

/// Conversation behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Minutes of inactivity after which a flow is abandoned
    pub ttl_minutes: i64,
    /// Offset of the local calendar from UTC, in hours
    pub utc_offset_hours: i32,
    /// Maximum number of trips shown per search
    pub search_result_limit: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 30,
            utc_offset_hours: 5,
            search_result_limit: 10,
        }
    }
}

impl ConversationConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !(1..=10_080).contains(&self.ttl_minutes) {
            return Err(AppError::Config(
                "CONVERSATION_TTL_MINUTES must be between 1 and 10080".to_string(),
            ));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(AppError::Config(
                "UTC_OFFSET_HOURS must be between -12 and 14".to_string(),
            ));
        }
        if !(1..=50).contains(&self.search_result_limit) {
            return Err(AppError::Config(
                "SEARCH_RESULT_LIMIT must be between 1 and 50".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_minutes)
    }

    /// Fixed offset of the local calendar
    pub fn timezone(&self) -> chrono::FixedOffset {
        chrono::FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| chrono::Utc.fix())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub conversation: ConversationConfig,
    pub observability: ObservabilityConfig,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a valid number", name))),
        Err(_) => Ok(default),
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        config.bot.token = env::var("TELEGRAM_BOT_TOKEN").map_err(|_| {
            AppError::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        config.bot.http_timeout_secs = parse_var("HTTP_CLIENT_TIMEOUT_SECS", 30)?;
        config.bot.webhook_url = optional_var("WEBHOOK_URL");
        config.bot.webhook_listen_port = parse_var("WEBHOOK_LISTEN_PORT", 8443)?;
        config.bot.admin_secret = optional_var("ADMIN_SECRET");

        config.database.url = optional_var("DATABASE_URL");
        config.database.max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 10)?;
        config.database.connect_timeout_secs = parse_var("DATABASE_CONNECT_TIMEOUT_SECS", 30)?;

        config.server.health_port = parse_var("HEALTH_PORT", 8080)?;
        config.server.allow_privileged_ports = env::var("ALLOW_PRIVILEGED_PORTS")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        config.conversation.ttl_minutes = parse_var("CONVERSATION_TTL_MINUTES", 30)?;
        config.conversation.utc_offset_hours = parse_var("UTC_OFFSET_HOURS", 5)?;
        config.conversation.search_result_limit = parse_var("SEARCH_RESULT_LIMIT", 10)?;

        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.bot.validate()?;
        self.database.validate()?;
        self.server.validate()?;
        self.conversation.validate()?;
        self.observability.validate().map_err(AppError::Config)?;

        if self.bot.webhook_url.is_some() && self.bot.webhook_listen_port == self.server.health_port
        {
            return Err(AppError::Config(
                "Webhook listen port and health port cannot be the same".to_string(),
            ));
        }
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: bot_token=[REDACTED], db={}, mode={}, health_port={}, admin_setup={}, ttl_minutes={}, utc_offset={}",
            if self.database.is_persistent() { "postgres" } else { "memory" },
            if self.bot.webhook_url.is_some() { "webhook" } else { "polling" },
            self.server.health_port,
            if self.bot.admin_secret.is_some() { "enabled" } else { "disabled" },
            self.conversation.ttl_minutes,
            self.conversation.utc_offset_hours
        )
    }
}
