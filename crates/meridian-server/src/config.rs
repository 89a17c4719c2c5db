use std::net::SocketAddr;
use std::path::PathBuf;

use meridian_relay::HostedConfig;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MERIDIAN_JWT_SECRET is unset or still a placeholder")]
    JwtSecret,

    #[error("{0} is required when MERIDIAN_RELAY=hosted")]
    MissingHosted(&'static str),

    #[error("MERIDIAN_RELAY must be 'local' or 'hosted', got '{0}'")]
    RelayMode(String),

    #[error("invalid listen address {0}")]
    Address(String),
}

#[derive(Debug, Clone)]
pub enum RelayConfig {
    /// Self-hosted WebSocket relay; `key`/`secret` sign channel subscriptions.
    Local { key: String, secret: String },
    Hosted(HostedConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub relay: RelayConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("MERIDIAN_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::JwtSecret);
        }

        let host = var("MERIDIAN_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("MERIDIAN_PORT").unwrap_or_else(|| "3000".into());
        let addr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| ConfigError::Address(format!("{}:{}", host, port)))?;

        let db_path = var("MERIDIAN_DB_PATH").unwrap_or_else(|| "meridian.db".into()).into();

        let relay = match var("MERIDIAN_RELAY").as_deref().unwrap_or("local") {
            "local" => RelayConfig::Local {
                key: var("MERIDIAN_RELAY_KEY").unwrap_or_else(|| "meridian".into()),
                secret: var("MERIDIAN_RELAY_SECRET").unwrap_or_else(|| jwt_secret.clone()),
            },
            "hosted" => {
                let required = |key: &'static str| var(key).ok_or(ConfigError::MissingHosted(key));
                RelayConfig::Hosted(HostedConfig {
                    app_id: required("PUSHER_APP_ID")?,
                    key: required("PUSHER_KEY")?,
                    secret: required("PUSHER_SECRET")?,
                    cluster: required("PUSHER_CLUSTER")?,
                })
            }
            other => return Err(ConfigError::RelayMode(other.to_string())),
        };

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            relay,
        })
    }
}
