//! Process configuration from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use kinship_infra::HttpDirectoryConfig;
use kinship_membership::MembershipConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_IDENTITY_TIMEOUT_MS: u64 = 3000;
const DEFAULT_IDENTITY_RETRIES: u32 = 2;
const MAX_IDENTITY_RETRIES: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{var} must be set when {because} is set")]
    Missing { var: &'static str, because: &'static str },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres connection string; in-memory storage when absent.
    pub database_url: Option<String>,
    /// External identity directory; in-memory directory when absent.
    pub directory: Option<HttpDirectoryConfig>,
    pub membership: MembershipConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let directory = match var("IDENTITY_DIRECTORY_URL") {
            None => None,
            Some(base_url) => {
                let required = |key: &'static str| {
                    var(key).ok_or(ConfigError::Missing {
                        var: key,
                        because: "IDENTITY_DIRECTORY_URL",
                    })
                };
                let retries = parse_or(&var, "IDENTITY_RETRIES", DEFAULT_IDENTITY_RETRIES)?;
                if retries > MAX_IDENTITY_RETRIES {
                    return Err(ConfigError::Invalid {
                        var: "IDENTITY_RETRIES",
                        reason: format!("at most {MAX_IDENTITY_RETRIES} retries are allowed"),
                    });
                }
                Some(HttpDirectoryConfig {
                    base_url,
                    service_email: required("IDENTITY_SERVICE_EMAIL")?,
                    service_password: required("IDENTITY_SERVICE_PASSWORD")?,
                    timeout: Duration::from_millis(parse_or(
                        &var,
                        "IDENTITY_TIMEOUT_MS",
                        DEFAULT_IDENTITY_TIMEOUT_MS,
                    )?),
                    retries,
                })
            }
        };

        let membership = MembershipConfig {
            attach_on_create: parse_or(&var, "ATTACH_ON_CREATE", false)?,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url: var("DATABASE_URL"),
            directory,
            membership,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key,
            reason: e.to_string(),
        }),
    }
}
