use std::{env, fmt, net::SocketAddr};

use super::{database_url, server_bind_address};

/// Secret used to verify bearer tokens when none is configured outside production.
pub const DEVELOPMENT_TOKEN_SECRET: &str = "jobtrack-development-secret";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub auth_token_secret: Vec<u8>,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let auth_token_secret = match env::var("AUTH_TOKEN_SECRET") {
            Ok(value) if !value.trim().is_empty() => value.into_bytes(),
            _ if environment == Environment::Production => {
                return Err(ConfigError::MissingTokenSecret)
            }
            _ => DEVELOPMENT_TOKEN_SECRET.as_bytes().to_vec(),
        };

        Ok(Self {
            bind_addr,
            environment,
            database_url: database_url(),
            auth_token_secret,
        })
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingTokenSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingTokenSecret => {
                write!(f, "AUTH_TOKEN_SECRET must be set when APP_ENV=production")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
