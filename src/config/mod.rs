//! Configuration management

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pairing: PairingConfig,
    pub delegate: DelegateConfig,
    pub client: ClientConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind_address: String,

    /// Port to listen on
    pub port: u16,

    /// Directory for per-session auth material
    pub sessions_dir: Option<PathBuf>,

    /// Expose the `/simulate` routes
    pub enable_simulation: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3001,
            sessions_dir: None,
            enable_simulation: true,
        }
    }
}

/// Pairing artifact settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Seconds before a QR code is replaced by a fresh one
    pub renewal_interval_secs: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            renewal_interval_secs: 20,
        }
    }
}

/// Messaging delegate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegateConfig {
    /// Delay before the simulated delegate shows its first QR code
    pub qr_delay_ms: u64,

    /// Upper bound on a single send
    pub send_timeout_secs: u64,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            qr_delay_ms: 1000,
            send_timeout_secs: 30,
        }
    }
}

/// CLI client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the gateway server
    pub server_url: String,

    /// Seconds between status polls in `watch`
    pub poll_interval_secs: u64,

    /// Polls before `watch` gives up
    pub max_poll_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3001".to_string(),
            poll_interval_secs: 5,
            max_poll_attempts: 60,
        }
    }
}

impl Config {
    /// Load config from the default location, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a specific file, or return defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            config
                .validate()
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Reject values the lifecycle timers cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pairing.renewal_interval_secs == 0 {
            bail!("pairing.renewal_interval_secs must be at least 1");
        }
        if self.delegate.send_timeout_secs == 0 {
            bail!("delegate.send_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wa-gateway")
            .join("config.toml")
    }

    /// Directory holding per-session auth material
    pub fn sessions_dir(&self) -> PathBuf {
        self.server.sessions_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("wa-gateway")
                .join("sessions")
        })
    }

    /// Socket address the server binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.bind_address, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid bind address {}:{}",
                    self.server.bind_address, self.server.port
                )
            })
    }
}
