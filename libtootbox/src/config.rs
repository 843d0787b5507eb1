//! Configuration management for Tootbox

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Path to a file containing the bot token, nothing else.
    pub token_file: String,
}

impl TelegramConfig {
    /// Read and trim the bot token from the configured file.
    pub fn read_token(&self) -> Result<String> {
        let path = shellexpand::tilde(&self.token_file).to_string();
        let token = std::fs::read_to_string(&path)
            .map_err(ConfigError::ReadError)?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "telegram token file {} is empty",
                path
            ))
            .into());
        }

        Ok(token)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Minimum spacing between a user's original posts, e.g. "4h".
    #[serde(default = "default_cooldown")]
    pub cooldown: String,

    /// How often the drain scheduler wakes up, e.g. "5m".
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cooldown: default_cooldown(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_cooldown() -> String {
    "4h".to_string()
}

fn default_poll_interval() -> String {
    "5m".to_string()
}

impl RelayConfig {
    pub fn cooldown_duration(&self) -> Result<Duration> {
        parse_duration_field("relay.cooldown", &self.cooldown)
    }

    pub fn poll_interval_duration(&self) -> Result<Duration> {
        parse_duration_field("relay.poll_interval", &self.poll_interval)
    }
}

fn parse_duration_field(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| {
        ConfigError::InvalidDuration {
            field: field.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/tootbox/outbox.db".to_string(),
            },
            telegram: TelegramConfig {
                token_file: "~/.config/tootbox/telegram.token".to_string(),
            },
            relay: RelayConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TOOTBOX_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("tootbox").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [database]
            path = "/tmp/tootbox/test.db"

            [telegram]
            token_file = "/tmp/tootbox/telegram.token"

            [relay]
            cooldown = "6h"
            poll_interval = "30s"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database.path, "/tmp/tootbox/test.db");
        assert_eq!(
            config.relay.cooldown_duration().unwrap(),
            Duration::from_secs(6 * 3600)
        );
        assert_eq!(
            config.relay.poll_interval_duration().unwrap(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_relay_defaults_when_section_absent() {
        let toml_str = r#"
            [database]
            path = "/tmp/test.db"

            [telegram]
            token_file = "/tmp/telegram.token"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.relay.cooldown_duration().unwrap(),
            Duration::from_secs(4 * 3600)
        );
        assert_eq!(
            config.relay.poll_interval_duration().unwrap(),
            Duration::from_secs(5 * 60)
        );
    }

    #[test]
    fn test_invalid_cooldown_is_config_error() {
        let relay = RelayConfig {
            cooldown: "soonish".to_string(),
            poll_interval: "5m".to_string(),
        };

        let result = relay.cooldown_duration();
        assert!(matches!(
            result,
            Err(crate::error::TootboxError::Config(
                ConfigError::InvalidDuration { .. }
            ))
        ));
    }

    #[test]
    fn test_default_config_parses_back() {
        let config = Config::default_config();
        let serialized = toml::to_string(&config).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.database.path, config.database.path);
        assert_eq!(reparsed.relay.cooldown, "4h");
    }

    #[test]
    fn test_read_token_trims_whitespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"  123456:ABC-token  \n").unwrap();
        file.flush().unwrap();

        let telegram = TelegramConfig {
            token_file: file.path().to_str().unwrap().to_string(),
        };
        assert_eq!(telegram.read_token().unwrap(), "123456:ABC-token");
    }

    #[test]
    fn test_read_token_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let telegram = TelegramConfig {
            token_file: file.path().to_str().unwrap().to_string(),
        };
        assert!(telegram.read_token().is_err());
    }
}
