//! TOML configuration for the `syslogkit` daemon.
//!
//! Every section and field is optional; missing values take their defaults.
//!
//! ```toml
//! [server]
//! port = 5140
//! udp = true
//! tcp = true
//!
//! [listener]
//! address = "0.0.0.0"
//! queue_size = 1024
//! backpressure = "drop_newest"
//!
//! [store]
//! path = "/var/lib/syslogkit/logs.db"
//!
//! [log]
//! level = "info"
//! ```

use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::listener::ListenerConfig;
use crate::store::StoreConfig;

/// Default listen port; unprivileged, unlike 514.
pub const DEFAULT_PORT: u16 = 5140;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("[{section}] has invalid {field}: {message}")]
    InvalidValue {
        section: &'static str,
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    fn invalid_value(section: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            section,
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub udp: bool,
    pub tcp: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            udp: true,
            tcp: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// As a `tracing` filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub listener: ListenerConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

impl Config {
    /// Read, parse and validate the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        contents.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.udp && !self.server.tcp {
            return Err(ConfigError::invalid_value(
                "server",
                "udp/tcp",
                "at least one transport must be enabled",
            ));
        }

        let listener = &self.listener;
        if listener.address.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "listener",
                "address",
                format!("'{}' is not an IP address", listener.address),
            ));
        }
        if listener.poll_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "listener",
                "poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if listener.tcp_read_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "listener",
                "tcp_read_timeout_ms",
                "must be greater than zero",
            ));
        }
        if listener.queue_size == 0 {
            return Err(ConfigError::invalid_value(
                "listener",
                "queue_size",
                "must be greater than zero",
            ));
        }
        if listener.udp_buffer_size == 0 || listener.tcp_buffer_size == 0 {
            return Err(ConfigError::invalid_value(
                "listener",
                "buffer size",
                "must be greater than zero",
            ));
        }
        if listener.tcp_backlog <= 0 {
            return Err(ConfigError::invalid_value(
                "listener",
                "tcp_backlog",
                "must be greater than zero",
            ));
        }

        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value("store", "path", "must not be empty"));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;
    use crate::listener::Backpressure;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 5140);
        assert!(config.server.udp && config.server.tcp);
        assert_eq!(config.store.path, PathBuf::from("syslogkit.db"));
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn full_config() {
        let toml = r#"
[server]
port = 1514
tcp = false

[listener]
address = "127.0.0.1"
queue_size = 16
backpressure = "drop_newest"

[store]
path = "/tmp/logs.db"

[log]
level = "debug"
"#;
        let config: Config = toml.parse().unwrap();
        assert_eq!(config.server.port, 1514);
        assert!(config.server.udp);
        assert!(!config.server.tcp);
        assert_eq!(config.listener.address, "127.0.0.1");
        assert_eq!(config.listener.queue_size, 16);
        assert_eq!(config.listener.backpressure, Backpressure::DropNewest);
        assert_eq!(config.listener.poll_interval_ms, 50);
        assert_eq!(config.store.path, PathBuf::from("/tmp/logs.db"));
        assert_eq!(config.log.level, LogLevel::Debug);
    }

    #[test]
    fn rejects_invalid_values() {
        for toml in [
            "[server]\nudp = false\ntcp = false",
            "[listener]\naddress = \"localhost\"",
            "[listener]\nqueue_size = 0",
            "[listener]\npoll_interval_ms = 0",
            "[listener]\ntcp_read_timeout_ms = 0",
            "[listener]\ntcp_backlog = 0",
            "[store]\npath = \"\"",
        ] {
            let err = toml.parse::<Config>().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { .. }), "{toml}: {err}");
        }
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = "[server\nport = 1".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = "[server]\nport = 70000".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = "[log]\nlevel = \"loud\"".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 2514").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 2514);
    }

    #[test]
    fn load_missing_file() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    fn level_as_str() {
        assert_eq!(LogLevel::Trace.as_str(), "trace");
        assert_eq!(LogLevel::Warn.as_str(), "warn");
    }
}
