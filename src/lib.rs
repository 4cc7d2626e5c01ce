//! hola-echo: a text-protocol TCP echo server
//!
//! Each message is answered by one of three rules:
//! - `DESCONEXION` closes the connection without a reply
//! - `hola server` is answered with `Hola Cliente`
//! - anything else is echoed back uppercased
//!
//! Features:
//! - One independent task per accepted connection
//! - Per-connection idle timeout and a recoverable accept timeout
//! - Configuration via CLI arguments, `TCP_SERVER_*` variables or a TOML file
//! - Console and file logging
//! - An interactive client speaking the same protocol

pub mod client;
pub mod config;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod session;

pub use client::{ClientExit, EchoClient};
pub use config::{Config, ConfigError, LoggingConfig, ServerConfig};
pub use server::{Server, ServerError};
pub use session::{Session, SessionEnd};
