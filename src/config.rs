//! Configuration module for the hola-echo server and client.
//!
//! Values come from command-line arguments, `TCP_SERVER_*` environment
//! variables and an optional TOML configuration file. CLI arguments take
//! precedence over the environment, which takes precedence over the file.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default host when nothing else is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default port when nothing else is configured.
pub const DEFAULT_PORT: u16 = 5000;
/// Default idle timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default listen backlog.
pub const DEFAULT_BACKLOG: i32 = 128;
/// Default log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "tcp_server.log";

/// Command-line arguments for the server
#[derive(Parser, Debug, Default)]
#[command(name = "hola-echo")]
#[command(author = "hola-echo authors")]
#[command(version = "0.1.0")]
#[command(about = "A text-protocol TCP echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1)
    #[arg(short = 'H', long, env = "TCP_SERVER_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TCP_SERVER_PORT")]
    pub port: Option<u16>,

    /// Per-connection idle timeout in seconds
    #[arg(short, long, env = "TCP_SERVER_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Accept timeout in seconds (defaults to the idle timeout)
    #[arg(long, env = "TCP_SERVER_ACCEPT_TIMEOUT")]
    pub accept_timeout: Option<u64>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Command-line arguments for the interactive client
#[derive(Parser, Debug, Default)]
#[command(name = "hola-echo-client")]
#[command(version = "0.1.0")]
#[command(about = "Interactive client for the hola-echo server", long_about = None)]
pub struct ClientArgs {
    /// Server host
    #[arg(short = 'H', long, env = "TCP_SERVER_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "TCP_SERVER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: TomlServer,
    #[serde(default)]
    pub logging: TomlLogging,
}

/// `[server]` section
#[derive(Debug, Deserialize)]
pub struct TomlServer {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Idle timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Accept timeout in seconds
    pub accept_timeout: Option<u64>,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for TomlServer {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: default_timeout(),
            accept_timeout: None,
            backlog: default_backlog(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Deserialize)]
pub struct TomlLogging {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for TomlLogging {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_backlog() -> i32 {
    DEFAULT_BACKLOG
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

/// Listening endpoint and session settings handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long a session may wait for a message before it is closed.
    pub idle_timeout: Duration,
    /// How long one accept call may block before a warning is logged.
    pub accept_timeout: Duration,
    pub backlog: i32,
}

impl ServerConfig {
    /// Build a config for `host:port` with default timeouts and backlog.
    ///
    /// Host and port are stored as given; resolution happens at bind time.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        Self {
            host: host.into(),
            port,
            idle_timeout: timeout,
            accept_timeout: timeout,
            backlog: DEFAULT_BACKLOG,
        }
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    /// `host:port` as written in the configuration.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

/// Logging sink settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from CLI args, environment and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI/env values over TOML values (CLI takes precedence).
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let timeout = cli.timeout.unwrap_or(toml_config.server.timeout);
        let accept_timeout = cli
            .accept_timeout
            .or(toml_config.server.accept_timeout)
            .unwrap_or(timeout);
        let backlog = cli.backlog.unwrap_or(toml_config.server.backlog);

        if timeout == 0 {
            return Err(ConfigError::Invalid("timeout must be at least 1 second".into()));
        }
        if accept_timeout == 0 {
            return Err(ConfigError::Invalid(
                "accept timeout must be at least 1 second".into(),
            ));
        }
        if backlog <= 0 {
            return Err(ConfigError::Invalid("backlog must be positive".into()));
        }

        let server = ServerConfig::new(
            cli.host.unwrap_or(toml_config.server.host),
            cli.port.unwrap_or(toml_config.server.port),
        )
        .with_idle_timeout(Duration::from_secs(timeout))
        .with_accept_timeout(Duration::from_secs(accept_timeout))
        .with_backlog(backlog);

        Ok(Config {
            server,
            logging: LoggingConfig {
                level: cli.log_level.unwrap_or(toml_config.logging.level),
                file: cli.log_file.unwrap_or(toml_config.logging.file),
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
