//! Configuration loading and resolution.
//!
//! Everything is read once at start-up: CLI flag first, then environment
//! variable, then the built-in default. The resulting [`ServerConfig`] is
//! immutable for the life of the process.

use std::time::Duration;

use clap::{ArgAction, Args, ValueEnum};

use crate::types::{InitOptions, McpError, McpResult};

pub const DEFAULT_ADDR: &str = "127.0.0.1:3100";
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;
pub const DEFAULT_STATS_SECS: u64 = 60;

/// Which transport driver to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportKind {
    /// One client over standard input/output.
    #[default]
    Stdio,
    /// Multi-worker streaming HTTP with SSE push.
    Http,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

/// Settings for the streaming HTTP runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub addr: String,
    pub workers: usize,
    pub max_connections: usize,
    pub sse_enabled: bool,
    pub heartbeat_interval: Duration,
    pub stats_interval: Duration,
    pub stats_enabled: bool,
    pub token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            workers: 1,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            sse_enabled: true,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            stats_interval: Duration::from_secs(DEFAULT_STATS_SECS),
            stats_enabled: false,
            token: None,
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> McpResult<()> {
        if self.workers == 0 {
            return Err(McpError::Config("workers must be at least 1".to_string()));
        }
        if self.max_connections == 0 {
            return Err(McpError::Config(
                "max connections must be at least 1".to_string(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(McpError::Config(
                "heartbeat interval must be positive".to_string(),
            ));
        }
        if self.stats_interval.is_zero() {
            return Err(McpError::Config("stats interval must be positive".to_string()));
        }
        Ok(())
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
    pub transport: TransportKind,
    pub http: HttpConfig,
    pub init: InitOptions,
}

/// Command-line flags for `serve`; every flag can also come from the environment.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Transport to run.
    #[arg(long, value_enum, env = "RPCWIRE_TRANSPORT", default_value_t = TransportKind::Stdio)]
    pub transport: TransportKind,

    /// Listen address for the HTTP transport (host:port).
    #[arg(long, env = "RPCWIRE_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Number of HTTP workers sharing the listening socket.
    #[arg(long, env = "RPCWIRE_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Maximum open SSE connections per worker.
    #[arg(long, env = "RPCWIRE_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,

    /// Enable the SSE push channel (true/false).
    #[arg(long, env = "RPCWIRE_SSE", default_value_t = true, action = ArgAction::Set)]
    pub sse: bool,

    /// Heartbeat interval in seconds.
    #[arg(long, env = "RPCWIRE_HEARTBEAT_SECS", default_value_t = DEFAULT_HEARTBEAT_SECS)]
    pub heartbeat_secs: u64,

    /// Stats interval in seconds.
    #[arg(long, env = "RPCWIRE_STATS_SECS", default_value_t = DEFAULT_STATS_SECS)]
    pub stats_secs: u64,

    /// Log a counters snapshot on every stats tick.
    #[arg(long, env = "RPCWIRE_STATS_LOG")]
    pub stats_log: bool,

    /// Bearer token required on /mcp.
    #[arg(long, env = "RPCWIRE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl ServeArgs {
    /// Resolve flags into a validated configuration.
    pub fn into_config(self) -> McpResult<ServerConfig> {
        let http = HttpConfig {
            addr: self.addr,
            workers: self.workers,
            max_connections: self.max_connections,
            sse_enabled: self.sse,
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            stats_interval: Duration::from_secs(self.stats_secs),
            stats_enabled: self.stats_log,
            token: self.token.filter(|t| !t.is_empty()),
        };

        if self.transport == TransportKind::Http {
            http.validate()?;
        }

        Ok(ServerConfig {
            transport: self.transport,
            http,
            init: InitOptions::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        serve: ServeArgs,
    }

    fn parse(args: &[&str]) -> McpResult<ServerConfig> {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().serve.into_config()
    }

    #[test]
    fn test_http_flags() {
        let config = parse(&[
            "--transport",
            "http",
            "--workers",
            "4",
            "--sse",
            "false",
            "--heartbeat-secs",
            "5",
            "--stats-log",
        ])
        .unwrap();

        assert_eq!(config.transport, TransportKind::Http);
        assert_eq!(config.http.workers, 4);
        assert!(!config.http.sse_enabled);
        assert_eq!(config.http.heartbeat_interval, Duration::from_secs(5));
        assert!(config.http.stats_enabled);
    }

    #[test]
    fn test_zero_workers_rejected_for_http() {
        let err = parse(&["--transport", "http", "--workers", "0"]).unwrap_err();
        assert!(matches!(err, McpError::Config(_)));
    }

    #[test]
    fn test_http_settings_ignored_for_stdio() {
        let config = parse(&["--transport", "stdio", "--workers", "0"]).unwrap();
        assert_eq!(config.transport, TransportKind::Stdio);
    }

    #[test]
    fn test_validate_intervals() {
        let config = HttpConfig {
            stats_interval: Duration::ZERO,
            ..HttpConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(HttpConfig::default().validate().is_ok());
    }
}
