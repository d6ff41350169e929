//! Configuration loading, validation, and management for Chorebot.
//!
//! Loads configuration from `~/.chorebot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.chorebot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Completion provider name ("openai", "openrouter", "ollama", ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model to request
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub reminder: ReminderConfig,

    #[serde(default)]
    pub locale: LocaleConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("agent", &self.agent)
            .field("store", &self.store)
            .field("slack", &self.slack)
            .field("calendar", &self.calendar)
            .field("reminder", &self.reminder)
            .field("locale", &self.locale)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on provider round trips per instruction
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_temperature() -> f32 {
    0.2
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path. Defaults to `~/.chorebot/chorebot.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Logical name of the chore record
    #[serde(default = "default_record_name")]
    pub record: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_record_name() -> String {
    "chore-state".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
            record: default_record_name(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (xoxb-...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Signing secret used to verify inbound requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,

    /// Override the Web API base URL (tests, proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("signing_secret", &redact(&self.signing_secret))
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

fn default_calendar_id() -> String {
    "primary".into()
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            calendar_id: default_calendar_id(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
        }
    }
}

impl std::fmt::Debug for CalendarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarConfig")
            .field("enabled", &self.enabled)
            .field("calendar_id", &self.calendar_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

impl CalendarConfig {
    /// Whether all credentials needed for the token exchange are present.
    pub fn has_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.refresh_token.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expressions (5-field, local time)
    #[serde(default = "default_reminder_schedules")]
    pub schedules: Vec<String>,

    /// Slack channel ID reminders are posted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Instruction handed to the orchestration loop
    #[serde(default = "default_reminder_prompt")]
    pub prompt: String,
}

fn default_reminder_schedules() -> Vec<String> {
    vec!["0 8 * * *".into(), "0 18 * * *".into()]
}
fn default_reminder_prompt() -> String {
    "Read the current chore assignments and write a short, friendly reminder \
     telling each person what they are responsible for today."
        .into()
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedules: default_reminder_schedules(),
            channel: None,
            prompt: default_reminder_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    /// IANA time zone name sent with calendar events
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Offset from UTC used for "today" and for cron matching
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

fn default_time_zone() -> String {
    "America/New_York".into()
}
fn default_utc_offset_minutes() -> i32 {
    -300
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

impl LocaleConfig {
    /// The configured offset. Falls back to UTC if out of range; `validate` rejects that case.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Bearer token required on the state API. None = open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            api_token: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("api_token", &redact(&self.api_token))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.chorebot/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides and validate.
    ///
    /// Environment variables:
    /// - `CHOREBOT_API_KEY`, then `OPENAI_API_KEY`
    /// - `CHOREBOT_PROVIDER`, `CHOREBOT_MODEL`
    /// - `SLACK_BOT_TOKEN`, `SLACK_SIGNING_SECRET`
    /// - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REFRESH_TOKEN`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup. Config-file values for
    /// secrets win; provider and model env vars always win.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("CHOREBOT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("CHOREBOT_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("CHOREBOT_MODEL") {
            self.model = model;
        }
        if self.slack.bot_token.is_none() {
            self.slack.bot_token = lookup("SLACK_BOT_TOKEN");
        }
        if self.slack.signing_secret.is_none() {
            self.slack.signing_secret = lookup("SLACK_SIGNING_SECRET");
        }
        if self.calendar.client_id.is_none() {
            self.calendar.client_id = lookup("GOOGLE_CLIENT_ID");
        }
        if self.calendar.client_secret.is_none() {
            self.calendar.client_secret = lookup("GOOGLE_CLIENT_SECRET");
        }
        if self.calendar.refresh_token.is_none() {
            self.calendar.refresh_token = lookup("GOOGLE_REFRESH_TOKEN");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chorebot")
    }

    /// SQLite path, defaulting under the config directory.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("chorebot.db"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be \"sqlite\" or \"memory\", got \"{}\"",
                self.store.backend
            )));
        }

        if self.store.record.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store.record must not be empty".into(),
            ));
        }

        if FixedOffset::east_opt(self.locale.utc_offset_minutes * 60).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "locale.utc_offset_minutes out of range: {}",
                self.locale.utc_offset_minutes
            )));
        }

        if self.reminder.enabled {
            for schedule in &self.reminder.schedules {
                if schedule.split_whitespace().count() != 5 {
                    return Err(ConfigError::ValidationError(format!(
                        "reminder schedule \"{schedule}\" must have 5 fields"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Whether the calendar tool should be registered.
    pub fn calendar_enabled(&self) -> bool {
        self.calendar.enabled && self.calendar.has_credentials()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            agent: AgentConfig::default(),
            store: StoreConfig::default(),
            slack: SlackConfig::default(),
            calendar: CalendarConfig::default(),
            reminder: ReminderConfig::default(),
            locale: LocaleConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.reminder.schedules.len(), 2);
        assert_eq!(config.store.record, "chore-state");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider, config.provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.reminder.schedules, config.reminder.schedules);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.agent.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_schedule_rejected() {
        let mut config = AppConfig::default();
        config.reminder.schedules = vec!["every morning".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_offset_rejected() {
        let mut config = AppConfig::default();
        config.locale.utc_offset_minutes = 60 * 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider, "openai");
    }

    #[test]
    fn loads_sections_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gpt-4o"

[agent]
max_iterations = 3

[reminder]
channel = "C0HOUSE"
schedules = ["30 7 * * *", "0 19 * * *"]

[locale]
time_zone = "Europe/Berlin"
utc_offset_minutes = 60

[calendar]
enabled = true
calendar_id = "family@group.calendar.google.com"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.reminder.channel.as_deref(), Some("C0HOUSE"));
        assert_eq!(config.locale.offset().local_minus_utc(), 3600);
        // Enabled but no credentials
        assert!(!config.calendar_enabled());
    }

    #[test]
    fn env_overrides_fill_missing_secrets() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-env"),
            ("CHOREBOT_MODEL", "gpt-4.1-mini"),
            ("SLACK_SIGNING_SECRET", "shh"),
            ("GOOGLE_CLIENT_ID", "cid"),
            ("GOOGLE_CLIENT_SECRET", "csecret"),
            ("GOOGLE_REFRESH_TOKEN", "rtoken"),
        ]);
        let mut config = AppConfig::default();
        config.calendar.enabled = true;
        config.slack.signing_secret = Some("from-file".into());
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.model, "gpt-4.1-mini");
        assert_eq!(config.slack.signing_secret.as_deref(), Some("from-file"));
        assert!(config.calendar_enabled());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-very-secret".into());
        config.slack.bot_token = Some("xoxb-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(!debug.contains("xoxb-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("0 8 * * *"));
    }
}
