//! Interactive client for the hola-echo server.
//!
//! Reads one line at a time from the operator, sends it without a line
//! terminator, and prints the server's reply. Sending the disconnect keyword
//! closes the connection without waiting for an answer.

use crate::protocol::{is_disconnect, MAX_MESSAGE_SIZE};
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const PROMPT: &[u8] = b"Enter a message ('DESCONEXION' to exit): ";

/// How an interactive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientExit {
    /// Nothing was listening on the server address.
    Refused,
    /// Connecting failed for another reason.
    ConnectFailed,
    /// The operator sent the disconnect keyword.
    Disconnected,
    /// The operator's input ran out.
    InputClosed,
    /// The server closed the connection.
    ServerClosed,
    /// Sending failed.
    SendFailed,
    /// Receiving failed.
    ReceiveFailed,
}

pub struct EchoClient {
    host: String,
    port: u16,
}

impl EchoClient {
    /// Host and port are stored as given.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connect and run the prompt/send/receive loop.
    ///
    /// Connection problems are reported on `output` and end the loop; only
    /// failures to talk to the operator are returned as errors.
    pub async fn run<R, W>(&self, mut input: R, mut output: W) -> io::Result<ClientExit>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let address = format!("{}:{}", self.host, self.port);
        debug!(address = %address, "Connecting");

        let mut stream = match TcpStream::connect(&address).await {
            Ok(stream) => stream,
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                let msg = format!("Could not connect to {address}. Is the server running?\n");
                output.write_all(msg.as_bytes()).await?;
                return Ok(ClientExit::Refused);
            }
            Err(e) => {
                output
                    .write_all(format!("Unexpected error: {e}\n").as_bytes())
                    .await?;
                return Ok(ClientExit::ConnectFailed);
            }
        };
        output
            .write_all(format!("Connected to {address}\n").as_bytes())
            .await?;

        let mut line = String::new();
        let mut buffer = BytesMut::zeroed(MAX_MESSAGE_SIZE);

        let exit = loop {
            output.write_all(PROMPT).await?;
            output.flush().await?;

            line.clear();
            if input.read_line(&mut line).await? == 0 {
                break ClientExit::InputClosed;
            }
            let message = line.trim_end_matches(['\r', '\n']);
            // An empty send never reaches the server, so there is no reply to wait for.
            if message.is_empty() {
                continue;
            }

            if let Err(e) = stream.write_all(message.as_bytes()).await {
                debug!(error = %e, "Send failed");
                output.write_all(b"Connection lost while sending data.\n").await?;
                break ClientExit::SendFailed;
            }

            if is_disconnect(message) {
                output.write_all(b"Disconnecting...\n").await?;
                break ClientExit::Disconnected;
            }

            match stream.read(&mut buffer[..]).await {
                Ok(0) => {
                    output.write_all(b"Server closed the connection.\n").await?;
                    break ClientExit::ServerClosed;
                }
                Ok(n) => {
                    let reply = String::from_utf8_lossy(&buffer[..n]);
                    output
                        .write_all(format!("Server response: {reply}\n").as_bytes())
                        .await?;
                }
                Err(e) => {
                    debug!(error = %e, "Receive failed");
                    output
                        .write_all(b"Connection lost while receiving data.\n")
                        .await?;
                    break ClientExit::ReceiveFailed;
                }
            }
        };

        output.flush().await?;
        Ok(exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::server::Server;
    use std::net::SocketAddr;
    use std::time::Duration;

    async fn start(config: ServerConfig) -> SocketAddr {
        let server = Server::new(config);
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { server.serve(listener).await });
        addr
    }

    async fn run(addr: SocketAddr, input: &str) -> (ClientExit, String) {
        let client = EchoClient::new(addr.ip().to_string(), addr.port());
        let mut output = Vec::new();
        let exit = client.run(input.as_bytes(), &mut output).await.unwrap();
        (exit, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_client_creation() {
        let client = EchoClient::new("localhost", 5003);
        assert_eq!(client.host(), "localhost");
        assert_eq!(client.port(), 5003);
    }

    #[tokio::test]
    async fn test_interactive_session() {
        let addr = start(ServerConfig::new("127.0.0.1", 0)).await;

        let (exit, output) = run(addr, "hello\nHola Server\n\nDESCONEXION\n").await;
        assert_eq!(exit, ClientExit::Disconnected);
        assert!(output.starts_with(&format!("Connected to {addr}\n")));
        assert!(output.contains("Server response: HELLO\n"));
        assert!(output.contains("Server response: Hola Cliente\n"));
        assert!(output.ends_with("Disconnecting...\n"));
    }

    #[tokio::test]
    async fn test_input_closed() {
        let addr = start(ServerConfig::new("127.0.0.1", 0)).await;

        let (exit, output) = run(addr, "abc\r\n").await;
        assert_eq!(exit, ClientExit::InputClosed);
        assert!(output.contains("Server response: ABC\n"));
    }

    #[tokio::test]
    async fn test_server_closed() {
        let config = ServerConfig::new("127.0.0.1", 0).with_idle_timeout(Duration::from_millis(100));
        let addr = start(config).await;

        let client = EchoClient::new(addr.ip().to_string(), addr.port());
        let (reader, mut writer) = tokio::io::duplex(64);
        let mut output = Vec::new();

        let session = tokio::spawn(async move {
            let exit = client
                .run(tokio::io::BufReader::new(reader), &mut output)
                .await
                .unwrap();
            (exit, output)
        });

        // Let the server's idle timeout fire before the first message.
        tokio::time::sleep(Duration::from_millis(400)).await;
        writer.write_all(b"too late\n").await.unwrap();

        let (exit, output) = session.await.unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(matches!(
            exit,
            ClientExit::ServerClosed | ClientExit::SendFailed | ClientExit::ReceiveFailed
        ));
        assert!(!output.contains("Server response"));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = EchoClient::new("127.0.0.1", port);
        let mut output = Vec::new();
        let exit = client.run(&b""[..], &mut output).await.unwrap();

        assert_eq!(exit, ClientExit::Refused);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            format!("Could not connect to 127.0.0.1:{port}. Is the server running?\n")
        );
    }
}
