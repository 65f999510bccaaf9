// src/config.rs
use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub cors_origin: String,
    pub session_ttl_hours: i64,
    pub max_upload_bytes: usize,
    pub db_max_connections: u32,
    pub cookie_secure: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Config {
    /// 从环境变量读取配置 (调用前应先执行 `dotenvy::dotenv()`)
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: try_load("BIND_ADDR", "127.0.0.1:5001")?,
            upload_dir: try_load("UPLOAD_DIR", "uploads")?,
            cors_origin: try_load("CORS_ORIGIN", "http://localhost:3000")?,
            session_ttl_hours: try_load("SESSION_TTL_HOURS", "168")?,
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", "10485760")?,
            db_max_connections: try_load("DB_MAX_CONNECTIONS", "5")?,
            cookie_secure: try_load("COOKIE_SECURE", "false")?,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => {
            warn!("Environment variable {key} not found");
            Err(ConfigError::Missing(key))
        }
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_into_their_types() {
        let addr: SocketAddr = try_load("DAYBOOK_TEST_UNSET_ADDR", "127.0.0.1:5001").unwrap();
        assert_eq!(addr.port(), 5001);

        let secure: bool = try_load("DAYBOOK_TEST_UNSET_FLAG", "false").unwrap();
        assert!(!secure);
    }

    #[test]
    fn bad_default_reports_key() {
        let err = try_load::<u32>("DAYBOOK_TEST_UNSET_NUM", "many").unwrap_err();
        assert!(err.to_string().contains("DAYBOOK_TEST_UNSET_NUM"));
    }

    #[test]
    fn missing_required_value_is_an_error() {
        assert!(matches!(
            required("DAYBOOK_TEST_UNSET_REQUIRED"),
            Err(ConfigError::Missing("DAYBOOK_TEST_UNSET_REQUIRED"))
        ));
    }
}
