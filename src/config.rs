//! Configuration types, read once from the environment at startup.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default local database file.
pub const DEFAULT_DB_PATH: &str = "./data/healthmate.db";

/// Status server bind address when `HEALTHMATE_HTTP_HOST` is unset.
pub const DEFAULT_HTTP_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Default generation request timeout.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Telegram channel settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Usernames or numeric user ids; `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// Where profiles are stored.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Hosted libSQL database.
    Remote { url: String, auth_token: SecretString },
    /// Local database file.
    Local { path: PathBuf },
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// `None` runs the bot on the CLI channel only.
    pub telegram: Option<TelegramConfig>,
    pub llm: LlmConfig,
    pub store: StoreConfig,
    /// Port for the status HTTP server; disabled when `None`.
    pub http_port: Option<u16>,
    /// Address the status HTTP server binds to.
    pub http_host: IpAddr,
    /// Directory for daily-rolling log files; stderr only when `None`.
    pub log_dir: Option<PathBuf>,
}

impl BotConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram = get("TELEGRAM_BOT_TOKEN").map(|token| TelegramConfig {
            bot_token: SecretString::from(token),
            allowed_users: parse_allowed_users(
                get("TELEGRAM_ALLOWED_USERS").as_deref().unwrap_or("*"),
            ),
        });

        let backend: LlmBackend = match get("HEALTHMATE_LLM_BACKEND") {
            Some(name) => name.parse()?,
            None => LlmBackend::Gemini,
        };
        let key_var = backend.api_key_var();
        let api_key = get(key_var).ok_or_else(|| ConfigError::MissingEnvVar(key_var.into()))?;
        let timeout_secs = match get("HEALTHMATE_LLM_TIMEOUT_SECS") {
            Some(raw) => parse_positive("HEALTHMATE_LLM_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_LLM_TIMEOUT_SECS,
        };
        let llm = LlmConfig {
            backend,
            api_key: SecretString::from(api_key),
            model: get("HEALTHMATE_MODEL").unwrap_or_else(|| backend.default_model().to_string()),
            timeout: Duration::from_secs(timeout_secs),
        };

        let store = match get("HEALTHMATE_DB_URL") {
            Some(url) => StoreConfig::Remote {
                url,
                auth_token: SecretString::from(get("HEALTHMATE_DB_AUTH_TOKEN").unwrap_or_default()),
            },
            None => StoreConfig::Local {
                path: PathBuf::from(
                    get("HEALTHMATE_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
                ),
            },
        };

        let http_port = match get("HEALTHMATE_HTTP_PORT") {
            Some(raw) => Some(raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "HEALTHMATE_HTTP_PORT".into(),
                message: e.to_string(),
            })?),
            None => None,
        };
        let http_host = match get("HEALTHMATE_HTTP_HOST") {
            Some(raw) => raw.parse::<IpAddr>().map_err(|e| ConfigError::InvalidValue {
                key: "HEALTHMATE_HTTP_HOST".into(),
                message: e.to_string(),
            })?,
            None => DEFAULT_HTTP_HOST,
        };

        Ok(Self {
            telegram,
            llm,
            store,
            http_port,
            http_host,
            log_dir: get("HEALTHMATE_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Split a comma-separated allowlist, dropping blanks.
fn parse_allowed_users(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: "must be greater than zero".into(),
        }),
        Ok(v) => Ok(v),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: e.to_string(),
        }),
    }
}
