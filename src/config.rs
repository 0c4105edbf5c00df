//! Agent identity and broker connection configuration
//!
//! Configuration comes either from a TOML file or from environment
//! variables. Secrets are never required in the file itself: by default the
//! secret key is resolved from `AGENT_SECRET_KEY` at load time.
//!
//! ```toml
//! [agent]
//! client_id = "my-agent"
//! key = "agent-key"
//! secret_key_env = "AGENT_SECRET_KEY"
//!
//! [connection]
//! host = "broker.example.com"
//! port = 8883
//! keepalive = 60
//! ```

use crate::protocol::{validate_identifier, validate_topic_segment, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Broker port used when none is configured
pub const DEFAULT_PORT: u16 = 8883;

/// Keepalive interval in seconds used when none is configured
pub const DEFAULT_KEEPALIVE_SECS: u16 = 60;

/// Environment variable holding the secret key unless configured otherwise
pub const DEFAULT_SECRET_KEY_ENV: &str = "AGENT_SECRET_KEY";

pub const CLIENT_ID_ENV: &str = "AGENT_CLIENT_ID";
pub const KEY_ENV: &str = "AGENT_KEY";
pub const HOST_ENV: &str = "AGENT_HOST";
pub const PORT_ENV: &str = "AGENT_PORT";
pub const KEEPALIVE_ENV: &str = "AGENT_KEEPALIVE";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::InvalidConfig(err.to_string())
    }
}

/// Who the agent is and how it authenticates
///
/// `client_id` scopes every topic; `key` and `secret_key` are sent as the
/// broker username and password.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub client_id: String,
    pub key: String,
    pub secret_key: String,
}

impl fmt::Debug for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentIdentity")
            .field("client_id", &self.client_id)
            .field("key", &self.key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl AgentIdentity {
    pub fn new(
        client_id: impl Into<String>,
        key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            key: key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// `client_id` must be usable as a topic level; both credentials non-empty
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_topic_segment("client_id", &self.client_id)?;
        validate_identifier("key", &self.key)?;
        validate_identifier("secret_key", &self.secret_key)?;
        Ok(())
    }

    /// Read `AGENT_CLIENT_ID`, `AGENT_KEY` and `AGENT_SECRET_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| ConfigError::EnvVarNotFound(name.to_string()))
        };

        let identity = Self::new(
            required(CLIENT_ID_ENV)?,
            required(KEY_ENV)?,
            required(DEFAULT_SECRET_KEY_ENV)?,
        );
        identity.validate()?;
        Ok(identity)
    }
}

/// Where the broker lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub keepalive_secs: u16,
}

impl ConnectionConfig {
    /// Connection to `host` with the default port and keepalive
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            keepalive_secs: DEFAULT_KEEPALIVE_SECS,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_keepalive(mut self, keepalive_secs: u16) -> Self {
        self.keepalive_secs = keepalive_secs;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("host", &self.host)?;
        Ok(())
    }

    /// Parse an `mqtts://host[:port]` URL
    ///
    /// TLS is always enabled on connect, so only TLS schemes are accepted.
    pub fn from_broker_url(broker_url: &str) -> Result<Self, ConfigError> {
        let url =
            Url::parse(broker_url).map_err(|_| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;

        if !matches!(url.scheme(), "mqtts" | "ssl") {
            return Err(ConfigError::InvalidBrokerUrl(format!(
                "{broker_url} (scheme must be mqtts or ssl)"
            )));
        }

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(broker_url.to_string()))?;

        Ok(Self::new(host).with_port(url.port().unwrap_or(DEFAULT_PORT)))
    }

    /// Read `AGENT_HOST`, `AGENT_PORT` and `AGENT_KEEPALIVE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST_ENV).ok_or_else(|| ConfigError::EnvVarNotFound(HOST_ENV.to_string()))?;
        let mut config = Self::new(host);

        if let Some(port) = lookup(PORT_ENV) {
            config.port = parse_number(PORT_ENV, &port)?;
        }
        if let Some(keepalive) = lookup(KEEPALIVE_ENV) {
            config.keepalive_secs = parse_number(KEEPALIVE_ENV, &keepalive)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_number(name: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Top-level TOML document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub connection: ConnectionSection,
}

/// `[agent]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    pub client_id: String,
    pub key: String,
    /// Inline secret; takes precedence over `secret_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,
}

/// `[connection]` section; exactly one of `host` and `broker_url`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSection {
    pub host: Option<String>,
    pub broker_url: Option<String>,
    /// Overrides the port of `broker_url` when both are given
    pub port: Option<u16>,
    #[serde(default = "default_keepalive")]
    pub keepalive: u16,
}

fn default_secret_key_env() -> String {
    DEFAULT_SECRET_KEY_ENV.to_string()
}

fn default_keepalive() -> u16 {
    DEFAULT_KEEPALIVE_SECS
}

impl AgentConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that do not need the environment
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_topic_segment("client_id", &self.agent.client_id)?;
        validate_identifier("key", &self.agent.key)?;

        match (&self.connection.host, &self.connection.broker_url) {
            (Some(_), Some(_)) => Err(ConfigError::InvalidConfig(
                "[connection] accepts either host or broker_url, not both".to_string(),
            )),
            (None, None) => Err(ConfigError::InvalidConfig(
                "[connection] requires host or broker_url".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Resolve the secret and split into the values the client needs
    pub fn into_parts(self) -> Result<(AgentIdentity, ConnectionConfig), ConfigError> {
        let connection = self.connection.resolve()?;

        let secret_key = match self.agent.secret_key {
            Some(secret) => secret,
            None => std::env::var(&self.agent.secret_key_env)
                .map_err(|_| ConfigError::EnvVarNotFound(self.agent.secret_key_env.clone()))?,
        };

        let identity = AgentIdentity::new(self.agent.client_id, self.agent.key, secret_key);
        identity.validate()?;
        Ok((identity, connection))
    }
}

impl ConnectionSection {
    fn resolve(&self) -> Result<ConnectionConfig, ConfigError> {
        let base = match (&self.host, &self.broker_url) {
            (Some(host), None) => ConnectionConfig::new(host.as_str()),
            (None, Some(url)) => ConnectionConfig::from_broker_url(url)?,
            _ => {
                return Err(ConfigError::InvalidConfig(
                    "[connection] requires exactly one of host and broker_url".to_string(),
                ))
            }
        };

        let config = match self.port {
            Some(port) => base.with_port(port),
            None => base,
        }
        .with_keepalive(self.keepalive);

        config.validate()?;
        Ok(config)
    }
}
