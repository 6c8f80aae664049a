//! Server configuration parsed from environment variables.
//!
//! `main` loads `.env` (if present) before calling `Config::from_env`, so
//! every knob below can live in either place.

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Identity endpoint called with `Authorization: Bearer <token>`.
    pub verify_url: Option<String>,
    /// Accept `dev:<uid>:<name>` tokens. Never enable in production.
    pub dev_tokens: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Postgres URL for the document store. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Bounded outbound queue per connection.
    pub client_channel_capacity: usize,
    /// Allowed CORS origin. `None` allows any origin.
    pub frontend_url: Option<String>,
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
            frontend_url: None,
            auth: AuthConfig { verify_url: None, dev_tokens: false, timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS },
        }
    }
}

impl Config {
    /// Build typed config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: in-memory store when absent
    /// - `DB_MAX_CONNECTIONS`: default 5
    /// - `CLIENT_CHANNEL_CAPACITY`: default 256
    /// - `FRONTEND_URL`: CORS origin, any when absent
    /// - `AUTH_VERIFY_URL`: identity endpoint for bearer tokens
    /// - `AUTH_DEV_TOKENS`: accept `dev:<uid>:<name>` tokens
    /// - `AUTH_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` when a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` when a variable is set but does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let client_channel_capacity = parse_or(&non_empty, "CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY)?;
        if client_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue { key: "CLIENT_CHANNEL_CAPACITY", value: "0".into() });
        }

        Ok(Self {
            port: parse_or(&non_empty, "PORT", DEFAULT_PORT)?,
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: parse_or(&non_empty, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            client_channel_capacity,
            frontend_url: non_empty("FRONTEND_URL"),
            auth: AuthConfig {
                verify_url: non_empty("AUTH_VERIFY_URL").map(|url| url.trim_end_matches('/').to_owned()),
                dev_tokens: match non_empty("AUTH_DEV_TOKENS") {
                    Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidValue { key: "AUTH_DEV_TOKENS", value: raw })?,
                    None => false,
                },
                timeout_secs: parse_or(&non_empty, "AUTH_TIMEOUT_SECS", DEFAULT_AUTH_TIMEOUT_SECS)?,
            },
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
