use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use inkpost_api::token::{AuthConfig, DEFAULT_TTL_HOURS};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["secret", "dev-secret-change-me", "change-me"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("INKPOST_JWT_SECRET is unset or empty")]
    MissingSecret,
    #[error("INKPOST_JWT_SECRET is still a placeholder value")]
    PlaceholderSecret,
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub auth: AuthConfig,
    pub seed: bool,
    pub seed_admin_password: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("INKPOST_JWT_SECRET").unwrap_or_default();
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if PLACEHOLDER_SECRETS.contains(&secret) {
            return Err(ConfigError::PlaceholderSecret);
        }

        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = parse("INKPOST_PORT", &or("INKPOST_PORT", "3000"))?;
        let ttl_hours: i64 = parse(
            "INKPOST_TOKEN_TTL_HOURS",
            &or("INKPOST_TOKEN_TTL_HOURS", &DEFAULT_TTL_HOURS.to_string()),
        )?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                var: "INKPOST_TOKEN_TTL_HOURS",
                value: ttl_hours.to_string(),
            });
        }

        let seed = match or("INKPOST_SEED", "false").trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "" | "0" | "false" | "no" => false,
            other => {
                return Err(ConfigError::Invalid {
                    var: "INKPOST_SEED",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            host: or("INKPOST_HOST", "0.0.0.0"),
            port,
            db_path: or("INKPOST_DB_PATH", "inkpost.db").into(),
            upload_dir: or("INKPOST_UPLOAD_DIR", "./uploads").into(),
            auth: AuthConfig::new(secret).with_ttl(Duration::hours(ttl_hours)),
            seed,
            seed_admin_password: lookup("INKPOST_SEED_ADMIN_PASSWORD").filter(|p| !p.is_empty()),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            var: "INKPOST_HOST",
            value: raw,
        })
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[("INKPOST_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.db_path, PathBuf::from("inkpost.db"));
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.auth.ttl, Duration::hours(72));
        assert!(!config.seed);
        assert!(config.seed_admin_password.is_none());
        assert_eq!(config.addr().unwrap().port(), 3000);
    }

    #[test]
    fn missing_or_placeholder_secret_is_fatal() {
        assert_eq!(load(&[]).err(), Some(ConfigError::MissingSecret));
        assert_eq!(
            load(&[("INKPOST_JWT_SECRET", "  ")]).err(),
            Some(ConfigError::MissingSecret)
        );
        for placeholder in PLACEHOLDER_SECRETS {
            assert_eq!(
                load(&[("INKPOST_JWT_SECRET", *placeholder)]).err(),
                Some(ConfigError::PlaceholderSecret)
            );
        }
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("INKPOST_JWT_SECRET", "a-real-secret"),
            ("INKPOST_PORT", "8080"),
            ("INKPOST_TOKEN_TTL_HOURS", "1"),
            ("INKPOST_SEED", "TRUE"),
            ("INKPOST_SEED_ADMIN_PASSWORD", "hunter22"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.auth.ttl, Duration::hours(1));
        assert!(config.seed);
        assert_eq!(config.seed_admin_password.as_deref(), Some("hunter22"));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = load(&[("INKPOST_JWT_SECRET", "a-real-secret"), ("INKPOST_PORT", "http")])
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Invalid { var: "INKPOST_PORT", .. }));

        let err = load(&[
            ("INKPOST_JWT_SECRET", "a-real-secret"),
            ("INKPOST_TOKEN_TTL_HOURS", "0"),
        ])
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::Invalid { var: "INKPOST_TOKEN_TTL_HOURS", .. }));
    }
}
