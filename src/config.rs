//! Configuration types for the reminder bot.
//!
//! Values come from built-in defaults, then an optional TOML file, then the
//! process environment (after a `.env` file has been loaded into it).

use crate::clock::parse_timezone;
use crate::error::{BotError, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const ENV_ACCOUNT_SID: &str = "TWILIO_ACCOUNT_SID";
pub const ENV_AUTH_TOKEN: &str = "TWILIO_AUTH_TOKEN";
pub const ENV_FROM: &str = "TWILIO_WHATSAPP_FROM";
pub const ENV_TO: &str = "MY_WHATSAPP_TO";
pub const ENV_DAILY_HOUR: &str = "DAILY_HOUR_IST";
pub const ENV_FORCE_SEND: &str = "FORCE_SEND";
pub const ENV_STATE_PATH: &str = "CADENCE_STATE_PATH";
pub const ENV_TIMEZONE: &str = "CADENCE_TIMEZONE";
pub const ENV_BIND: &str = "CADENCE_BIND";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Outbound messaging provider.
    pub provider: ProviderConfig,
    /// Daily send time.
    pub schedule: ScheduleConfig,
    /// Progress record location.
    pub state: StateConfig,
    /// Inbound webhook server.
    pub gateway: GatewayConfig,
    /// Message wording.
    pub messages: MessagesConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Twilio credentials and addresses.
///
/// `Debug` redacts the credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number, with or without the `whatsapp:` prefix.
    pub from: String,
    /// Recipient number, with or without the `whatsapp:` prefix.
    pub to: String,
    /// REST API base URL.
    pub api_base: String,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from: String::new(),
            to: String::new(),
            api_base: "https://api.twilio.com".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("account_sid", &redact(&self.account_sid))
            .field("auth_token", &redact(&self.auth_token))
            .field("from", &self.from)
            .field("to", &self.to)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn redact(s: &str) -> &str {
    if s.is_empty() { "" } else { "[REDACTED]" }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local hour (0-23) of the daily send.
    pub daily_hour: u8,
    /// IANA timezone that defines "today" and the send hour.
    pub timezone: String,
    /// Bypass the per-day guard on on-demand dispatch. The scheduler ignores
    /// this.
    pub force_send: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_hour: 17,
            timezone: "Asia/Kolkata".to_owned(),
            force_send: false,
        }
    }
}

impl ScheduleConfig {
    /// Force flag for an on-demand dispatch: the caller's request or
    /// `force_send`.
    #[must_use]
    pub fn on_demand_force(&self, requested: bool) -> bool {
        requested || self.force_send
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tasks.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 5000,
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Name used in the greeting line.
    pub recipient_name: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            recipient_name: "there".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rotated log files. Stderr only when unset.
    pub directory: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: "cadence=info".to_owned(),
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl BotConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| BotError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| BotError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/cadence/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("cadence")
            .join("config.toml")
    }

    /// Defaults, then `path` (or the default path if it exists), then the
    /// process environment.
    ///
    /// # Errors
    ///
    /// Fails if an explicit `path` cannot be loaded or an environment value
    /// does not parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from `lookup`, normally the process environment.
    ///
    /// Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] for an unparseable hour or bind address.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ACCOUNT_SID) {
            self.provider.account_sid = v;
        }
        if let Some(v) = get(ENV_AUTH_TOKEN) {
            self.provider.auth_token = v;
        }
        if let Some(v) = get(ENV_FROM) {
            self.provider.from = v;
        }
        if let Some(v) = get(ENV_TO) {
            self.provider.to = v;
        }
        if let Some(v) = get(ENV_DAILY_HOUR) {
            self.schedule.daily_hour = v
                .trim()
                .parse()
                .map_err(|_| BotError::Config(format!("{ENV_DAILY_HOUR}=`{v}` is not an hour")))?;
        }
        if let Some(v) = get(ENV_FORCE_SEND) {
            self.schedule.force_send = parse_flag(&v);
        }
        if let Some(v) = get(ENV_STATE_PATH) {
            self.state.path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_TIMEZONE) {
            self.schedule.timezone = v.trim().to_owned();
        }
        if let Some(v) = get(ENV_BIND) {
            let (host, port) = v
                .trim()
                .rsplit_once(':')
                .ok_or_else(|| BotError::Config(format!("{ENV_BIND}=`{v}` is not host:port")))?;
            self.gateway.port = port
                .parse()
                .map_err(|_| BotError::Config(format!("{ENV_BIND}=`{v}` has a bad port")))?;
            self.gateway.host = host.trim_start_matches('[').trim_end_matches(']').to_owned();
        }
        Ok(())
    }

    /// The configured timezone.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] for unknown names.
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.schedule.timezone)
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueSeverity {
    Warning,
    Error,
}

/// Validation issue surfaced before startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub id: String,
    pub title: String,
    pub severity: ConfigIssueSeverity,
    pub summary: String,
}

impl ConfigIssue {
    fn error(id: &str, title: &str, summary: String) -> Self {
        Self {
            id: id.to_owned(),
            title: title.to_owned(),
            severity: ConfigIssueSeverity::Error,
            summary,
        }
    }
}

/// What a command needs from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Schedule and state only.
    Local,
    /// Also sends through the provider.
    Provider,
    /// Also serves the webhook.
    Server,
}

/// Validate configuration without network calls.
#[must_use]
pub fn validate_config(config: &BotConfig, requirement: Requirement) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if config.schedule.daily_hour > 23 {
        issues.push(ConfigIssue::error(
            "schedule-hour-out-of-range",
            "Daily hour out of range",
            format!(
                "schedule.daily_hour is {}; use a local hour from 0 to 23.",
                config.schedule.daily_hour
            ),
        ));
    }

    if let Err(e) = config.timezone() {
        issues.push(ConfigIssue::error(
            "schedule-unknown-timezone",
            "Unknown timezone",
            e.to_string(),
        ));
    }

    if config.state.path.as_os_str().is_empty() {
        issues.push(ConfigIssue::error(
            "state-path-empty",
            "State path empty",
            "state.path must name the progress record file.".to_owned(),
        ));
    }

    if requirement != Requirement::Local {
        let provider = &config.provider;
        for (field, env, value) in [
            ("account_sid", ENV_ACCOUNT_SID, &provider.account_sid),
            ("auth_token", ENV_AUTH_TOKEN, &provider.auth_token),
            ("from", ENV_FROM, &provider.from),
            ("to", ENV_TO, &provider.to),
        ] {
            if value.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    &format!("provider-missing-{field}"),
                    "Provider setting missing",
                    format!("Set provider.{field} or {env}."),
                ));
            }
        }
    }

    if requirement == Requirement::Server {
        let host = config.gateway.host.trim();
        if matches!(host, "0.0.0.0" | "::" | "[::]") {
            issues.push(ConfigIssue {
                id: "gateway-public-unauthenticated".to_owned(),
                title: "Webhook is public and unauthenticated".to_owned(),
                severity: ConfigIssueSeverity::Warning,
                summary: format!(
                    "The webhook listens on {} and does not verify callers; anyone who can reach it can mark tasks done.",
                    config.gateway.bind_addr()
                ),
            });
        }
    }

    issues
}
