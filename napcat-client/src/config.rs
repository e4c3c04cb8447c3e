//! Configuration loading
//!
//! Reads `$XDG_CONFIG_HOME/napcat/config.toml`. Every section is optional;
//! a missing file yields the defaults.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use napcat_utils::{config_file, NapcatError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default deadline for a correlated request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time `close()` waits for the transport before aborting the reader
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Default per-subscriber queue capacity
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 512;

/// Tunables for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub request_timeout: Duration,
    pub close_grace: Duration,
    pub subscriber_capacity: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            close_grace: DEFAULT_CLOSE_GRACE,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

/// Full configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub connection: ConnectionConfig,
}

/// Forward connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the peer (ws:// or wss://)
    pub url: String,
    /// Access token sent as a bearer token
    pub token: Option<String>,
    #[serde(skip)]
    pub connection: ConnectionOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3001".into(),
            token: None,
            connection: ConnectionOptions::default(),
        }
    }
}

/// Reverse (accepting) server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Token every incoming peer must present
    pub token: Option<String>,
    #[serde(skip)]
    pub connection: ConnectionOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            token: None,
            connection: ConnectionOptions::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Parsed bind address, when the host is a literal IP
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.bind_addr().parse().ok()
    }
}

/// Connection tunables as written in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub request_timeout_secs: u64,
    pub close_grace_ms: u64,
    pub subscriber_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            close_grace_ms: DEFAULT_CLOSE_GRACE.as_millis() as u64,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl ConnectionConfig {
    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            close_grace: Duration::from_millis(self.close_grace_ms),
            subscriber_capacity: self.subscriber_capacity,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        let path = config_file();
        if !path.exists() {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| NapcatError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::parse(&content).map_err(|e| match e {
            NapcatError::Config(message) => NapcatError::ConfigInvalid {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(|e| NapcatError::config(e.to_string()))?;
        config.validate()?;

        let options = config.connection.options();
        config.client.connection = options;
        config.server.connection = options;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection.subscriber_capacity == 0 {
            return Err(NapcatError::config("connection.subscriber_capacity must be greater than 0"));
        }
        if self.connection.request_timeout_secs == 0 {
            return Err(NapcatError::config("connection.request_timeout_secs must be greater than 0"));
        }
        if self.connection.close_grace_ms == 0 {
            return Err(NapcatError::config("connection.close_grace_ms must be greater than 0"));
        }
        validate_ws_url(&self.client.url)?;
        Ok(())
    }
}

/// Check that `url` is a ws:// or wss:// URL with a host
pub fn validate_ws_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| NapcatError::config(format!("Invalid URL '{}': {}", url, e)))?;

    match parsed.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(NapcatError::config(format!(
                "Unsupported URL scheme '{}' (expected ws or wss)",
                other
            )))
        }
    }
    if parsed.host_str().is_none() {
        return Err(NapcatError::config(format!("Missing host in URL '{}'", url)));
    }
    Ok(parsed)
}
