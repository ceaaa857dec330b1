//! Runtime configuration read from the environment.

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub name: String,
    pub password: SecretString,
}

#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub session_secret: SecretString,
    /// Set when `SESSION_SECRET` was missing and a random one was generated
    pub session_secret_generated: bool,
    pub session_ttl_hours: i64,
    pub default_weekly_capacity_hours: f64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub anthropic_api_key: Option<SecretString>,
    pub anthropic_model: Option<String>,
    pub log_json: bool,
}

impl Config {
    pub const DEFAULT_DATABASE_URL: &'static str = "sqlite://crm.db?mode=rwc";
    pub const DEFAULT_PORT: u16 = 3001;
    /// One year
    pub const MAX_SESSION_TTL_HOURS: i64 = 8760;

    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                reason: e.to_string(),
            })?,
            None => Self::DEFAULT_PORT,
        };

        let session_ttl_hours = match get("SESSION_TTL_HOURS") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(hours) if (1..=Self::MAX_SESSION_TTL_HOURS).contains(&hours) => hours,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "SESSION_TTL_HOURS",
                        reason: format!(
                            "expected between 1 and {} hours, got {raw:?}",
                            Self::MAX_SESSION_TTL_HOURS
                        ),
                    });
                }
            },
            None => 24,
        };

        let default_weekly_capacity_hours = match get("DEFAULT_WEEKLY_CAPACITY_HOURS") {
            Some(raw) => match raw.parse::<f64>() {
                Ok(hours) if (0.0..=168.0).contains(&hours) => hours,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "DEFAULT_WEEKLY_CAPACITY_HOURS",
                        reason: format!("expected hours between 0 and 168, got {raw:?}"),
                    });
                }
            },
            None => 40.0,
        };

        let (session_secret, session_secret_generated) = match get("SESSION_SECRET") {
            Some(secret) => (SecretString::from(secret), false),
            None => (SecretString::from(random_secret()), true),
        };

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                name: get("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
                password: SecretString::from(password),
            }),
            _ => None,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| Self::DEFAULT_DATABASE_URL.to_string()),
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            session_secret,
            session_secret_generated,
            session_ttl_hours,
            default_weekly_capacity_hours,
            bootstrap_admin,
            anthropic_api_key: get("ANTHROPIC_API_KEY").map(SecretString::from),
            anthropic_model: get("ANTHROPIC_MODEL"),
            log_json: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, Config::DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_address(), "127.0.0.1:3001");
        assert_eq!(config.session_ttl_hours, 24);
        assert_eq!(config.default_weekly_capacity_hours, 40.0);
        assert!(config.bootstrap_admin.is_none());
        assert!(config.anthropic_api_key.is_none());
        assert!(!config.session_secret.expose_secret().is_empty());
        assert!(config.session_secret_generated);
    }

    #[test]
    fn explicit_values_and_blank_keys() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("SESSION_SECRET", "s3cret"),
            ("ANTHROPIC_API_KEY", "   "),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@example.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "changeme123"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_secret.expose_secret(), "s3cret");
        assert!(!config.session_secret_generated);
        assert!(config.anthropic_api_key.is_none());
        assert_eq!(config.bootstrap_admin.unwrap().name, "Administrator");
        assert!(config.log_json);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(config_from(&[("PORT", "http")]).is_err());
        assert!(config_from(&[("SESSION_TTL_HOURS", "0")]).is_err());
        assert!(config_from(&[("SESSION_TTL_HOURS", "8761")]).is_err());
        assert!(config_from(&[("SESSION_TTL_HOURS", "9223372036854775807")]).is_err());
        assert_eq!(
            config_from(&[("SESSION_TTL_HOURS", "8760")]).unwrap().session_ttl_hours,
            8760
        );
        assert!(config_from(&[("DEFAULT_WEEKLY_CAPACITY_HOURS", "200")]).is_err());
    }
}
