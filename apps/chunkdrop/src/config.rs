//! Service configuration.
//!
//! Configuration is read from an optional TOML file; every field has a
//! default, and command-line flags override whatever the file sets.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chunkdrop_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PATH, WS_PING_PERIOD, WS_PONG_WAIT};
use chunkdrop_transfer::CleanupScope;
use chunkdrop_upload_server::ServerConfig;
use serde::{Deserialize, Serialize};

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address both listeners bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port of the landing page.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Port of the upload WebSocket server (0 = auto-assign).
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// Path accepted for the WebSocket upgrade.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Directory uploads are written to. Created at startup if missing.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Which transfers a disconnect closes.
    #[serde(default)]
    pub cleanup_scope: CleanupScope,

    /// Largest accepted WebSocket message, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_http_port() -> u16 {
    8080
}

fn default_ws_port() -> u16 {
    8081
}

fn default_ws_path() -> String {
    WS_PATH.into()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_message_size() -> usize {
    WS_MAX_MESSAGE_SIZE
}

fn default_ping_interval_secs() -> u64 {
    WS_PING_PERIOD.as_secs()
}

fn default_pong_timeout_secs() -> u64 {
    WS_PONG_WAIT.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            ws_path: default_ws_path(),
            upload_dir: default_upload_dir(),
            cleanup_scope: CleanupScope::default(),
            max_message_size: default_max_message_size(),
            ping_interval_secs: default_ping_interval_secs(),
            pong_timeout_secs: default_pong_timeout_secs(),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub upload_dir: Option<PathBuf>,
    pub http_port: Option<u16>,
    pub ws_port: Option<u16>,
    pub cleanup_scope: Option<CleanupScope>,
}

impl Config {
    /// Loads configuration from `path`, or uses defaults when no path is
    /// given. A path that was given but cannot be read is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    /// Applies command-line overrides.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(dir) = overrides.upload_dir {
            self.upload_dir = dir;
        }
        if let Some(port) = overrides.http_port {
            self.http_port = port;
        }
        if let Some(port) = overrides.ws_port {
            self.ws_port = port;
        }
        if let Some(scope) = overrides.cleanup_scope {
            self.cleanup_scope = scope;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !self.ws_path.starts_with('/') {
            anyhow::bail!("ws_path must start with '/': {:?}", self.ws_path);
        }
        if self.max_message_size == 0 {
            anyhow::bail!("max_message_size must be greater than zero");
        }
        if self.ping_interval_secs == 0 || self.pong_timeout_secs == 0 {
            anyhow::bail!("keepalive intervals must be greater than zero");
        }
        Ok(())
    }

    /// Settings for the upload WebSocket server.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.ws_port,
            path: self.ws_path.clone(),
            max_message_size: self.max_message_size,
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs),
            cleanup_scope: self.cleanup_scope,
        }
    }
}
