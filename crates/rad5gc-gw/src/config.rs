use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use thiserror::Error;

/// Configuration file read from the working directory at startup
pub const DEFAULT_CONFIG_FILE: &str = "confrad5gcgw.yaml";

/// Default RADIUS authentication bind address
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:1812";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Gateway configuration
///
/// Keys mirror `confrad5gcgw.yaml`. The `filename`/`maxSize`/`maxBackups`/
/// `maxAge`/`localTime`/`compress` group describes the log file handed to
/// the external rotation tooling; the gateway itself only opens the file
/// for append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Log file path; empty logs to stdout
    #[serde(default)]
    pub filename: String,

    /// Maximum log file size in megabytes before rotation
    #[serde(default)]
    pub max_size: u32,

    /// Rotated log files kept
    #[serde(default)]
    pub max_backups: u32,

    /// Days a rotated log file is kept
    #[serde(default)]
    pub max_age: u32,

    /// Timestamp rotated files in local time instead of UTC
    #[serde(default)]
    pub local_time: bool,

    /// Compress rotated log files
    #[serde(default)]
    pub compress: bool,

    /// RADIUS shared secret (1-258 bytes)
    #[serde(default)]
    pub shared_secret: String,

    /// The single RADIUS client IP the gateway answers
    #[serde(default)]
    pub allowed_client_address: String,

    /// Dump every request AVP at debug level
    #[serde(default)]
    pub attributes_logging: bool,

    /// AUSF `host:port` for N12 requests
    #[serde(default)]
    pub ausf_address: String,

    /// Rewrite the authority of AUSF-advertised eap-session links to
    /// `ausfAddress` before storing them
    #[serde(default)]
    pub overwrite_link_string: bool,

    /// UDP bind address for the RADIUS server
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            filename: String::new(),
            max_size: 0,
            max_backups: 0,
            max_age: 0,
            local_time: false,
            compress: false,
            shared_secret: String::new(),
            allowed_client_address: String::new(),
            attributes_logging: false,
            ausf_address: String::new(),
            overwrite_link_string: false,
            listen_address: default_listen_address(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The shared secret as bytes
    pub fn secret(&self) -> &[u8] {
        self.shared_secret.as_bytes()
    }

    /// The validated client IP address
    pub fn allowed_client_ip(&self) -> Result<IpAddr, ConfigError> {
        self.allowed_client_address.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "Invalid client address: {}",
                self.allowed_client_address
            ))
        })
    }

    /// Socket address for binding the RADIUS server
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid listen address: {}", self.listen_address))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared_secret.is_empty() || self.shared_secret.len() > 258 {
            return Err(ConfigError::Invalid(
                "Shared secret must be between 1 and 258 bytes".to_string(),
            ));
        }

        self.allowed_client_ip()?;

        let (host, port) = self.ausf_address.split_once(':').ok_or_else(|| {
            ConfigError::Invalid(format!(
                "Invalid AUSF address (expected host:port): {}",
                self.ausf_address
            ))
        })?;
        let _: IpAddr = host.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid AUSF address: {}", self.ausf_address))
        })?;
        let _: u16 = port.parse().map_err(|_| {
            ConfigError::Invalid(format!("Invalid AUSF port number: {port}"))
        })?;

        self.listen_addr()?;

        Ok(())
    }
}
