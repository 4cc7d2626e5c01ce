//! TCP server for hola-echo connections.
//!
//! Binds the listening socket, accepts connections and spawns one
//! independent session task per connection. Sessions share nothing; the
//! dispatcher never waits for them and never caps how many run at once.

use crate::config::ServerConfig;
use crate::session::handle_connection;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not
/// spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Fatal startup errors.
#[derive(Debug)]
pub enum ServerError {
    /// The configured host/port could not be resolved.
    Resolve(String, io::Error),
    /// Resolution succeeded but produced no address.
    NoAddress(String),
    /// Creating, binding or listening on the socket failed.
    Bind(SocketAddr, io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Resolve(address, e) => {
                write!(f, "Failed to resolve '{address}': {e}")
            }
            ServerError::NoAddress(address) => {
                write!(f, "No usable address for '{address}'")
            }
            ServerError::Bind(addr, e) => write!(f, "Failed to bind/listen on {addr}: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Resolve(_, e) | ServerError::Bind(_, e) => Some(e),
            ServerError::NoAddress(_) => None,
        }
    }
}

/// Server instance
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: ServerConfig) -> Self {
        Server { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind and serve until the process exits.
    ///
    /// Only a bind/listen failure returns.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Resolve the configured address and open the listening socket.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = self.config.address();
        let addr = tokio::net::lookup_host(&address)
            .await
            .map_err(|e| ServerError::Resolve(address.clone(), e))?
            .next()
            .ok_or_else(|| ServerError::NoAddress(address.clone()))?;

        let listener = create_listener(addr, self.config.backlog)
            .map_err(|e| ServerError::Bind(addr, e))?;
        let listener = TcpListener::from_std(listener).map_err(|e| ServerError::Bind(addr, e))?;

        info!(
            address = %address,
            backlog = self.config.backlog,
            "Server listening"
        );
        Ok(listener)
    }

    /// Accept connections forever, one session task per connection.
    pub async fn serve(&self, listener: TcpListener) {
        let accept_timeout = self.config.accept_timeout;
        let idle_timeout = self.config.idle_timeout;

        loop {
            match tokio::time::timeout(accept_timeout, listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    info!(peer = %peer, "Connection established");

                    tokio::spawn(async move {
                        let end = handle_connection(stream, peer, idle_timeout).await;
                        debug!(peer = %peer, reason = %end, "Session finished");
                    });
                }
                Ok(Err(e)) => accept_failed(&e).await,
                Err(_) => {
                    warn!(
                        timeout_secs = accept_timeout.as_secs_f64(),
                        "No connection within accept timeout"
                    );
                }
            }
        }
    }
}

async fn accept_failed(e: &io::Error) {
    error!(error = %e, "Failed to accept connection");
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Create a non-blocking TCP listener with the given backlog.
fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}
