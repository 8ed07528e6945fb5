//! Server configuration.
//!
//! Values come from, lowest precedence first:
//! 1. compiled defaults
//! 2. a JSON file: `TICTACTOE_CONFIG_PATH`, else `tictactoe.json` in the
//!    working directory when it exists
//! 3. `TICTACTOE_*` environment variables
//!
//! ```json
//! { "port": 58901, "occupied_cell_policy": "ignore" }
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "TICTACTOE_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "tictactoe.json";

/// Room for the longest valid command, `MOVE r c\r\n`, with spacing to spare.
const MIN_LINE_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config JSON at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// What to tell a player who picks a cell that is already marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupiedCellPolicy {
    /// Reply `OCCUPIED <row> <col>` to the sender.
    #[default]
    Reject,
    /// Drop the move without any reply.
    Ignore,
}

impl FromStr for OccupiedCellPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "ignore" => Ok(Self::Ignore),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Lines that may queue up for one connection before it is dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    /// Longest inbound line, terminator included. Longer lines end the
    /// connection as a protocol violation.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    #[serde(default = "default_keepalive_time_secs")]
    pub keepalive_time_secs: u64,
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    /// How long a finished connection may take to flush its last lines.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    #[serde(default)]
    pub occupied_cell_policy: OccupiedCellPolicy,
    /// Used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    58901
}
fn default_outbound_buffer() -> usize {
    64
}
fn default_max_line_bytes() -> usize {
    256
}
fn default_keepalive_time_secs() -> u64 {
    10
}
fn default_keepalive_interval_secs() -> u64 {
    1
}
fn default_drain_timeout_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            outbound_buffer: default_outbound_buffer(),
            max_line_bytes: default_max_line_bytes(),
            keepalive_time_secs: default_keepalive_time_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            drain_timeout_ms: default_drain_timeout_ms(),
            occupied_cell_policy: OccupiedCellPolicy::default(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Defaults, then the config file, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `TICTACTOE_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name, value })
        }

        if let Some(value) = lookup("TICTACTOE_BIND_ADDRESS") {
            self.bind_address = value;
        }
        if let Some(value) = lookup("TICTACTOE_PORT") {
            self.port = parse("TICTACTOE_PORT", value)?;
        }
        if let Some(value) = lookup("TICTACTOE_OUTBOUND_BUFFER") {
            self.outbound_buffer = parse("TICTACTOE_OUTBOUND_BUFFER", value)?;
        }
        if let Some(value) = lookup("TICTACTOE_MAX_LINE_BYTES") {
            self.max_line_bytes = parse("TICTACTOE_MAX_LINE_BYTES", value)?;
        }
        if let Some(value) = lookup("TICTACTOE_OCCUPIED_CELL_POLICY") {
            self.occupied_cell_policy = parse("TICTACTOE_OCCUPIED_CELL_POLICY", value)?;
        }
        if let Some(value) = lookup("TICTACTOE_LOG_LEVEL") {
            self.log_level = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_address is empty".into()));
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid(
                "outbound_buffer must be at least 1".into(),
            ));
        }
        if self.max_line_bytes < MIN_LINE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "max_line_bytes must be at least {MIN_LINE_BYTES}"
            )));
        }
        self.socket_addr().map(|_| ())
    }

    /// `bind_address` must be an IPv4 or IPv6 literal.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind_address.trim().parse().map_err(|e| {
            ConfigError::Invalid(format!(
                "bind_address '{}' is not an IP address: {e}",
                self.bind_address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
