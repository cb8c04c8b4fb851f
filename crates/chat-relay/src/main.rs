//! Chat relay: entry point.
//!
//! Accepts WebSocket connections, gives each client an anonymous session,
//! replays the chat history to every newcomer, and broadcasts each message
//! any client sends to all connected clients.
//!
//! # Usage
//!
//! ```text
//! chat-relay [OPTIONS]
//!
//! Options:
//!   --config <PATH>             TOML config file
//!   --bind <IP>                 Listener IP address [default: 0.0.0.0]
//!   --port <PORT>               Listener port [default: 8081]
//!   --max-message-size <BYTES>  Largest inbound message [default: 1048576]
//!   --outbound-queue <FRAMES>   Per-client outbound queue [default: 256]
//!   --log-level <FILTER>        Log filter when RUST_LOG is unset [default: info]
//! ```
//!
//! # Precedence
//!
//! Built-in defaults, then the config file, then CLI flags (or their
//! environment variables).  `RUST_LOG` beats every log level setting.
//!
//! | Variable                      | Flag                 |
//! |-------------------------------|----------------------|
//! | `CHAT_RELAY_CONFIG`           | `--config`           |
//! | `CHAT_RELAY_BIND`             | `--bind`             |
//! | `CHAT_RELAY_PORT`             | `--port`             |
//! | `CHAT_RELAY_MAX_MESSAGE_SIZE` | `--max-message-size` |
//! | `CHAT_RELAY_OUTBOUND_QUEUE`   | `--outbound-queue`   |
//! | `CHAT_RELAY_LOG_LEVEL`        | `--log-level`        |

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::domain::RelayConfig;
use chat_relay::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Real-time WebSocket chat relay.
///
/// Every flag is optional; unset flags keep the config file's value, or the
/// built-in default when there is no file.
#[derive(Debug, Parser)]
#[command(
    name = "chat-relay",
    about = "WebSocket chat relay with history replay and broadcast",
    version
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "CHAT_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the listener to.
    ///
    /// Use `0.0.0.0` to accept connections on every interface, or
    /// `127.0.0.1` for local clients only.
    #[arg(long, env = "CHAT_RELAY_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "CHAT_RELAY_PORT")]
    port: Option<u16>,

    /// Largest inbound WebSocket message, in bytes.
    #[arg(long, env = "CHAT_RELAY_MAX_MESSAGE_SIZE")]
    max_message_size: Option<usize>,

    /// Frames buffered per client before further frames are dropped.
    #[arg(long, env = "CHAT_RELAY_OUTBOUND_QUEUE")]
    outbound_queue: Option<usize>,

    /// `tracing` filter used when `RUST_LOG` is not set.
    #[arg(long, env = "CHAT_RELAY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Builds the effective [`RelayConfig`]: defaults, then `--config`, then
    /// the individual flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, `--bind` is not
    /// an IP address, or the merged values fail validation.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => RelayConfig::default(),
        };

        if let Some(bind) = &self.bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(size) = self.max_message_size {
            config.max_message_size = size;
        }
        if let Some(queue) = self.outbound_queue {
            config.outbound_queue = queue;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Parses the CLI and builds the [`RelayConfig`].
/// 2. Installs `tracing_subscriber` with `RUST_LOG`, falling back to the
///    configured log level.
/// 3. Spawns a Ctrl+C handler that clears the shared `running` flag.
/// 4. Runs [`run_server`] until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_relay_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        bind = %config.bind_addr,
        max_message_size = config.max_message_size,
        outbound_queue = config.outbound_queue,
        "chat relay starting"
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("chat relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn bare_cli() -> Cli {
        Cli {
            config: None,
            bind: None,
            port: None,
            max_message_size: None,
            outbound_queue: None,
            log_level: None,
        }
    }

    #[test]
    fn test_no_flags_yield_default_config() {
        // Arrange / Act
        let config = bare_cli().into_relay_config().unwrap();

        // Assert
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_cli_parses_port_flag() {
        let cli = Cli::parse_from(["chat-relay", "--port", "9999"]);
        assert_eq!(cli.port, Some(9999));
    }

    #[test]
    fn test_cli_parses_bind_flag() {
        let cli = Cli::parse_from(["chat-relay", "--bind", "127.0.0.1"]);
        assert_eq!(cli.bind.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_bind_and_port_combine_into_address() {
        let cli = Cli {
            bind: Some("127.0.0.1".to_string()),
            port: Some(9000),
            ..bare_cli()
        };

        let config = cli.into_relay_config().unwrap();

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_port_alone_keeps_default_ip() {
        let cli = Cli {
            port: Some(7000),
            ..bare_cli()
        };

        let config = cli.into_relay_config().unwrap();

        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:7000");
    }

    #[test]
    fn test_invalid_bind_returns_error() {
        // Arrange: not an IP address
        let cli = Cli {
            bind: Some("not.an.ip".to_string()),
            ..bare_cli()
        };

        // Act
        let result = cli.into_relay_config();

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_outbound_queue_is_rejected() {
        let cli = Cli {
            outbound_queue: Some(0),
            ..bare_cli()
        };
        assert!(cli.into_relay_config().is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        // Arrange: a file setting port 9100 and queue 8
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind_addr = \"127.0.0.1:9100\"\noutbound_queue = 8").unwrap();
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            port: Some(9200),
            ..bare_cli()
        };

        // Act
        let config = cli.into_relay_config().unwrap();

        // Assert: file IP and queue kept, port overridden
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9200");
        assert_eq!(config.outbound_queue, 8);
    }

    #[test]
    fn test_missing_config_file_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: Some(dir.path().join("nope.toml")),
            ..bare_cli()
        };
        assert!(cli.into_relay_config().is_err());
    }

    #[test]
    fn test_log_level_override() {
        let cli = Cli {
            log_level: Some("debug".to_string()),
            ..bare_cli()
        };
        assert_eq!(cli.into_relay_config().unwrap().log_level, "debug");
    }
}
