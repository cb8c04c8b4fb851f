//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! It starts from built-in defaults, may be overlaid by a TOML file, and is
//! finally overridden by CLI flags in `main.rs`.
//!
//! ```toml
//! bind_addr = "0.0.0.0:8081"
//! max_message_size = 1048576
//! outbound_queue = 256
//! log_level = "info"
//! ```
//!
//! Every key is optional; missing keys keep their default.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use chat_core::protocol::messages::MAX_FIELD_LEN;

/// Error type for loading and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use chat_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8081);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Largest inbound WebSocket message accepted from a client, in bytes.
    ///
    /// Capped at the codec's field maximum: content above it could never be
    /// encoded into a frame.
    pub max_message_size: usize,

    /// Capacity of each client's outbound frame queue.
    ///
    /// When a slow client's queue is full, further frames for that client
    /// are dropped and logged; other clients are unaffected.
    pub outbound_queue: usize,

    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for RelayConfig {
    /// | Field            | Default          |
    /// |------------------|------------------|
    /// | bind_addr        | `0.0.0.0:8081`   |
    /// | max_message_size | 1 MiB            |
    /// | outbound_queue   | 256 frames       |
    /// | log_level        | `info`           |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            max_message_size: MAX_FIELD_LEN,
            outbound_queue: 256,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for bad TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// errors of [`RelayConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_queue == 0 {
            return Err(ConfigError::Invalid(
                "outbound_queue must be at least 1".to_string(),
            ));
        }
        if self.max_message_size == 0 || self.max_message_size > MAX_FIELD_LEN {
            return Err(ConfigError::Invalid(format!(
                "max_message_size must be between 1 and {MAX_FIELD_LEN}"
            )));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_port_is_8081() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.bind_addr.port(), 8081);
        assert!(cfg.bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_is_valid() {
        assert!(RelayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg = RelayConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_given_keys() {
        let cfg = RelayConfig::from_toml_str(
            r#"
            bind_addr = "127.0.0.1:9000"
            outbound_queue = 16
            "#,
        )
        .unwrap();

        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.outbound_queue, 16);
        assert_eq!(cfg.max_message_size, MAX_FIELD_LEN);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result = RelayConfig::from_toml_str("rooms = 3");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_bad_address_is_rejected() {
        let result = RelayConfig::from_toml_str(r#"bind_addr = "not-an-address""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_queue_is_invalid() {
        let result = RelayConfig::from_toml_str("outbound_queue = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_message_size_above_field_max_is_invalid() {
        let cfg = RelayConfig {
            max_message_size: MAX_FIELD_LEN + 1,
            ..RelayConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"debug\"").unwrap();

        let cfg = RelayConfig::load(file.path()).unwrap();

        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RelayConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
