//! Settings for a single probe session.
//!
//! Everything the session needs is carried in [SessionConfig]; nothing is read
//! from globals once the session is constructed. [SessionConfig::from_env]
//! is a convenience for the binary and reads a `.env` file first if one exists.

use std::{fmt, time::Duration};

use crate::{error::ConfigError, packet::PacketType};

pub const DEFAULT_PORT: u16 = 27210;
pub const DEFAULT_COMMAND: &str = "get playerinfo";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_READ_ATTEMPTS: usize = 5;
pub const DEFAULT_REPLY_BUFFER_SIZE: usize = 8192;

#[derive(Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Command to run once authenticated. `None` stops after auth.
    pub command: Option<String>,
    pub connect_timeout: Duration,
    /// How long a single receive attempt may wait for new bytes.
    pub read_timeout: Duration,
    pub max_read_attempts: usize,
    pub reply_buffer_size: usize,
    /// Auth reply types that count as success. Servers are seen answering with
    /// both SERVERDATA_AUTH_RESPONSE and SERVERDATA_RESPONSE_VALUE.
    pub success_types: Vec<i32>,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        SessionConfig {
            host: host.into(),
            port,
            password: password.into(),
            command: Some(String::from(DEFAULT_COMMAND)),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_read_attempts: DEFAULT_READ_ATTEMPTS,
            reply_buffer_size: DEFAULT_REPLY_BUFFER_SIZE,
            success_types: vec![
                PacketType::AuthResponse.value(),
                PacketType::Response.value(),
            ],
        }
    }

    pub fn with_command(mut self, command: Option<&str>) -> Self {
        self.command = command.map(String::from);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_read_attempts(mut self, attempts: usize) -> Self {
        self.max_read_attempts = attempts;
        self
    }

    pub fn with_success_types(mut self, types: &[i32]) -> Self {
        self.success_types = types.to_vec();
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Read `RCON_*` variables from the process environment, after loading a
    /// `.env` file if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| match lookup(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::Missing(key)),
        };

        let host = required("RCON_HOST")?;
        let password = required("RCON_PASSWORD")?;
        let port = parse_or(&lookup, "RCON_PORT", DEFAULT_PORT)?;

        let mut config = SessionConfig::new(host.trim(), port, password);

        if let Some(command) = lookup("RCON_COMMAND") {
            let command = command.trim();
            config.command = (!command.is_empty()).then(|| String::from(command));
        }

        config.connect_timeout = Duration::from_secs(positive(
            &lookup,
            "RCON_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT.as_secs(),
        )?);
        config.read_timeout = Duration::from_secs(positive(
            &lookup,
            "RCON_READ_TIMEOUT_SECS",
            DEFAULT_READ_TIMEOUT.as_secs(),
        )?);
        config.max_read_attempts =
            positive(&lookup, "RCON_READ_ATTEMPTS", DEFAULT_READ_ATTEMPTS as u64)? as usize;

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn positive<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, key, default)? {
        0 => Err(ConfigError::Invalid {
            key,
            value: String::from("0"),
        }),
        value => Ok(value),
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("command", &self.command)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_read_attempts", &self.max_read_attempts)
            .field("reply_buffer_size", &self.reply_buffer_size)
            .field("success_types", &self.success_types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config =
            SessionConfig::from_lookup(lookup(&[("RCON_HOST", "10.0.0.5"), ("RCON_PASSWORD", "pw")]))
                .unwrap();

        assert_eq!(config.address(), "10.0.0.5:27210");
        assert_eq!(config.command.as_deref(), Some("get playerinfo"));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(2));
        assert_eq!(config.max_read_attempts, 5);
        assert_eq!(config.success_types, vec![2, 0]);
    }

    #[test]
    fn overrides() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("RCON_HOST", "example.org"),
            ("RCON_PASSWORD", "pw"),
            ("RCON_PORT", "7779"),
            ("RCON_COMMAND", ""),
            ("RCON_READ_ATTEMPTS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.port, 7779);
        assert_eq!(config.command, None);
        assert_eq!(config.max_read_attempts, 3);
    }

    #[test]
    fn missing_and_invalid() {
        assert_eq!(
            SessionConfig::from_lookup(lookup(&[("RCON_PASSWORD", "pw")])).unwrap_err(),
            ConfigError::Missing("RCON_HOST")
        );
        assert_eq!(
            SessionConfig::from_lookup(lookup(&[
                ("RCON_HOST", "h"),
                ("RCON_PASSWORD", "pw"),
                ("RCON_PORT", "eighty"),
            ]))
            .unwrap_err(),
            ConfigError::Invalid {
                key: "RCON_PORT",
                value: String::from("eighty")
            }
        );
        assert!(SessionConfig::from_lookup(lookup(&[
            ("RCON_HOST", "h"),
            ("RCON_PASSWORD", "pw"),
            ("RCON_READ_TIMEOUT_SECS", "0"),
        ]))
        .is_err());
    }

    #[test]
    fn debug_hides_password() {
        let config = SessionConfig::new("h", 1, "s3cret");
        assert!(!format!("{:?}", config).contains("s3cret"));
    }
}
