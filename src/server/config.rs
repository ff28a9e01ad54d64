use chrono::Duration;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::services::otp_service::OtpPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpDelivery {
    Log,
    Webhook,
}

impl FromStr for OtpDelivery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(OtpDelivery::Log),
            "webhook" => Ok(OtpDelivery::Webhook),
            other => Err(format!("unknown delivery '{other}', expected 'log' or 'webhook'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub max_connections: u32,
    pub frontend_url: Option<String>,

    pub admin_username: String,
    pub admin_password_hash: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,

    pub otp_ttl_seconds: i64,
    pub otp_max_attempts: i32,
    pub otp_delivery: OtpDelivery,
    pub otp_webhook_url: Option<String>,
    pub otp_webhook_token: Option<String>,
    pub otp_webhook_template: String,
    pub otp_expose_in_response: bool,

    pub require_validation: bool,
    pub default_country_code: Option<String>,
    pub broadcast_capacity: usize,
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_addr: Option<String>,
    database_url: Option<String>,
    max_connections: Option<u32>,
    frontend_url: Option<String>,
    admin_username: Option<String>,
    admin_password_hash: Option<String>,
    jwt_secret: Option<String>,
    token_ttl_hours: Option<i64>,
    otp_ttl_seconds: Option<i64>,
    otp_max_attempts: Option<i32>,
    otp_delivery: Option<String>,
    otp_webhook_url: Option<String>,
    otp_webhook_token: Option<String>,
    otp_webhook_template: Option<String>,
    otp_expose_in_response: Option<bool>,
    require_validation: Option<bool>,
    default_country_code: Option<String>,
    broadcast_capacity: Option<usize>,
    log_dir: Option<String>,
}

pub const DEFAULT_WEBHOOK_TEMPLATE: &str =
    r#"{"to":"{{ phone }}","message":"Your voting code is {{ otp }}. It expires in {{ ttl_minutes }} minutes."}"#;

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl ServerConfig {
    /// Loads the optional TOML file, then lets environment variables override it.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path) => read_file_layer(Path::new(path))?,
            None => PartialServerConfig::default(),
        };
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()?;

        Self::from_layers(env_config, file_config)
    }

    fn from_layers(
        env: PartialServerConfig,
        file: PartialServerConfig,
    ) -> Result<Self, ConfigError> {
        let listen_addr = env
            .listen_addr
            .or(file.listen_addr)
            .unwrap_or_else(default_listen_addr);
        let listen_addr = listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "listen_addr",
                reason: e.to_string(),
            })?;

        let otp_delivery = match env.otp_delivery.or(file.otp_delivery) {
            Some(raw) => raw.parse::<OtpDelivery>().map_err(|reason| ConfigError::Invalid {
                key: "otp_delivery",
                reason,
            })?,
            None => OtpDelivery::Log,
        };

        let config = ServerConfig {
            listen_addr,
            database_url: env
                .database_url
                .or(file.database_url)
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            max_connections: env.max_connections.or(file.max_connections).unwrap_or(10),
            frontend_url: env.frontend_url.or(file.frontend_url),
            admin_username: env
                .admin_username
                .or(file.admin_username)
                .ok_or(ConfigError::Missing("ADMIN_USERNAME"))?,
            admin_password_hash: env
                .admin_password_hash
                .or(file.admin_password_hash)
                .ok_or(ConfigError::Missing("ADMIN_PASSWORD_HASH"))?,
            jwt_secret: env
                .jwt_secret
                .or(file.jwt_secret)
                .ok_or(ConfigError::Missing("JWT_SECRET"))?,
            token_ttl_hours: env.token_ttl_hours.or(file.token_ttl_hours).unwrap_or(24),
            otp_ttl_seconds: env.otp_ttl_seconds.or(file.otp_ttl_seconds).unwrap_or(300),
            otp_max_attempts: env.otp_max_attempts.or(file.otp_max_attempts).unwrap_or(5),
            otp_delivery,
            otp_webhook_url: env.otp_webhook_url.or(file.otp_webhook_url),
            otp_webhook_token: env.otp_webhook_token.or(file.otp_webhook_token),
            otp_webhook_template: env
                .otp_webhook_template
                .or(file.otp_webhook_template)
                .unwrap_or_else(|| DEFAULT_WEBHOOK_TEMPLATE.to_string()),
            otp_expose_in_response: env
                .otp_expose_in_response
                .or(file.otp_expose_in_response)
                .unwrap_or(false),
            require_validation: env
                .require_validation
                .or(file.require_validation)
                .unwrap_or(true),
            default_country_code: env.default_country_code.or(file.default_country_code),
            broadcast_capacity: env
                .broadcast_capacity
                .or(file.broadcast_capacity)
                .unwrap_or(100),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 16 {
            return Err(ConfigError::Invalid {
                key: "jwt_secret",
                reason: "must be at least 16 characters".to_string(),
            });
        }
        if self.otp_ttl_seconds <= 0 {
            return Err(ConfigError::Invalid {
                key: "otp_ttl_seconds",
                reason: "must be positive".to_string(),
            });
        }
        if self.otp_max_attempts <= 0 {
            return Err(ConfigError::Invalid {
                key: "otp_max_attempts",
                reason: "must be positive".to_string(),
            });
        }
        if self.token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "token_ttl_hours",
                reason: "must be positive".to_string(),
            });
        }
        if self.max_connections == 0 || self.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "max_connections",
                reason: "pool size and broadcast capacity must be non-zero".to_string(),
            });
        }
        if self.otp_delivery == OtpDelivery::Webhook && self.otp_webhook_url.is_none() {
            return Err(ConfigError::Missing("OTP_WEBHOOK_URL"));
        }
        Ok(())
    }

    pub fn otp_policy(&self) -> OtpPolicy {
        OtpPolicy {
            ttl: Duration::seconds(self.otp_ttl_seconds),
            max_attempts: self.otp_max_attempts,
        }
    }
}

fn read_file_layer(path: &Path) -> Result<PartialServerConfig, ConfigError> {
    if !path.exists() {
        return Ok(PartialServerConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
impl ServerConfig {
    pub(crate) const TEST_ADMIN_PASSWORD: &'static str = "correct horse battery";

    pub(crate) fn for_tests() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr().parse().expect("default addr"),
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            frontend_url: None,
            admin_username: "admin".to_string(),
            admin_password_hash: bcrypt::hash(Self::TEST_ADMIN_PASSWORD, 4).expect("bcrypt"),
            jwt_secret: "test-secret-0123456789".to_string(),
            token_ttl_hours: 1,
            otp_ttl_seconds: 300,
            otp_max_attempts: 3,
            otp_delivery: OtpDelivery::Log,
            otp_webhook_url: None,
            otp_webhook_token: None,
            otp_webhook_template: DEFAULT_WEBHOOK_TEMPLATE.to_string(),
            otp_expose_in_response: true,
            require_validation: true,
            default_country_code: Some("33".to_string()),
            broadcast_capacity: 16,
            log_dir: default_log_dir(),
        }
    }
}
