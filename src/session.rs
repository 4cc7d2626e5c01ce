//! Per-connection session handling.
//!
//! A session owns its stream exclusively and loops
//! receive -> dispatch -> reply until the peer leaves, asks to disconnect,
//! goes idle for too long or the connection fails. Every exit path drops the
//! stream, which closes the socket.

use crate::protocol::{dispatch, Action, MAX_MESSAGE_SIZE};
use bytes::BytesMut;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, warn};

/// Why a session stopped.
#[derive(Debug)]
pub enum SessionEnd {
    /// Zero-byte read: the peer closed its side.
    PeerClosed,
    /// The peer sent the disconnect keyword.
    DisconnectRequested,
    /// Nothing arrived within the idle timeout.
    IdleTimeout(Duration),
    /// Reset or other network error while reading.
    ReadFailed(io::Error),
    /// The reply could not be sent.
    SendFailed(io::Error),
    /// The received chunk was not valid UTF-8.
    InvalidUtf8,
}

impl SessionEnd {
    /// Whether the session ended because of a failure rather than a normal
    /// close or timeout.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SessionEnd::ReadFailed(_) | SessionEnd::SendFailed(_) | SessionEnd::InvalidUtf8
        )
    }

    fn log(&self, peer: SocketAddr) {
        match self {
            SessionEnd::PeerClosed => info!(peer = %peer, "Peer closed the connection"),
            SessionEnd::DisconnectRequested => {
                info!(peer = %peer, "Client requested DESCONEXION")
            }
            SessionEnd::IdleTimeout(timeout) => warn!(
                peer = %peer,
                timeout_secs = timeout.as_secs_f64(),
                "Connection timed out"
            ),
            SessionEnd::ReadFailed(e) => warn!(peer = %peer, error = %e, "Connection error"),
            SessionEnd::SendFailed(e) => warn!(peer = %peer, error = %e, "Failed to send reply"),
            SessionEnd::InvalidUtf8 => error!(peer = %peer, "Received invalid UTF-8"),
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::PeerClosed => write!(f, "peer closed the connection"),
            SessionEnd::DisconnectRequested => write!(f, "disconnect requested"),
            SessionEnd::IdleTimeout(timeout) => {
                write!(f, "idle for more than {:.1}s", timeout.as_secs_f64())
            }
            SessionEnd::ReadFailed(e) => write!(f, "read failed: {e}"),
            SessionEnd::SendFailed(e) => write!(f, "send failed: {e}"),
            SessionEnd::InvalidUtf8 => write!(f, "message was not valid UTF-8"),
        }
    }
}

/// One accepted connection and its handler loop.
pub struct Session<S> {
    stream: S,
    peer: SocketAddr,
    idle_timeout: Duration,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, idle_timeout: Duration) -> Self {
        Self {
            stream,
            peer,
            idle_timeout,
        }
    }

    /// Serve the connection until it ends, then close it.
    pub async fn run(mut self) -> SessionEnd {
        let end = self.serve().await;
        end.log(self.peer);

        let peer = self.peer;
        drop(self);
        info!(peer = %peer, "Connection closed");
        end
    }

    async fn serve(&mut self) -> SessionEnd {
        let mut buffer = BytesMut::zeroed(MAX_MESSAGE_SIZE);

        loop {
            let read = tokio::time::timeout(self.idle_timeout, self.stream.read(&mut buffer[..]));
            let n = match read.await {
                Err(_) => return SessionEnd::IdleTimeout(self.idle_timeout),
                Ok(Err(e)) => return SessionEnd::ReadFailed(e),
                Ok(Ok(0)) => return SessionEnd::PeerClosed,
                Ok(Ok(n)) => n,
            };

            let message = match std::str::from_utf8(&buffer[..n]) {
                Ok(message) => message,
                Err(_) => return SessionEnd::InvalidUtf8,
            };
            info!(peer = %self.peer, content = %message, "Message received");

            match dispatch(message) {
                Action::Disconnect => return SessionEnd::DisconnectRequested,
                Action::Reply(payload) => {
                    if let Err(e) = self.stream.write_all(payload.as_bytes()).await {
                        return SessionEnd::SendFailed(e);
                    }
                }
            }
        }
    }
}

/// Handle a single client connection.
pub async fn handle_connection<S>(stream: S, peer: SocketAddr, idle_timeout: Duration) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Session::new(stream, peer, idle_timeout).run().await
}
