//! Connection acceptor for the sensor daemon.
//!
//! The server:
//! - Listens on a TCP socket for client connections
//! - Spawns a SessionHandler for each client
//! - Shares one read-only SensorRegistry with every session
//! - Alternatively runs a single session over stdin/stdout
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    TcpServer    │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌──────────────────────┐
//! │ SessionHandler  │────▶│ Arc<SensorRegistry>  │
//! │  (per client)   │     │     (read-only)      │
//! └─────────────────┘     └──────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

mod session;

pub use session::{SessionEnd, SessionError, SessionHandler, MAX_LINE_LENGTH};

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use ksg_core::SensorRegistry;

/// Default TCP port in daemon mode
pub const DEFAULT_PORT: u16 = 2635;

/// Default listen host
pub const DEFAULT_HOST: &str = "localhost";

/// Pause after a failed accept, so persistent failures such as EMFILE do
/// not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// TCP acceptor running one session per connection.
pub struct TcpServer {
    /// Bound listener
    listener: TcpListener,

    /// Registry shared by all sessions
    registry: Arc<SensorRegistry>,

    /// Connection counter for session labels
    connection_counter: AtomicU64,
}

impl TcpServer {
    /// Binds the listening socket.
    ///
    /// A bind failure is returned to the caller, which treats it as fatal.
    pub async fn bind(
        host: &str,
        port: u16,
        registry: Arc<SensorRegistry>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| ServerError::Bind {
                addr: format!("{host}:{port}"),
                error: e.to_string(),
            })?;

        Ok(Self {
            listener,
            registry,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until the cancellation token is triggered.
    pub async fn run(&self, cancel_token: CancellationToken) {
        match self.local_addr() {
            Ok(addr) => info!(addr = %addr, "Listening"),
            Err(e) => info!(error = %e, "Listening on unknown address"),
        }

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, addr, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }

    /// Handles a new client connection by spawning a session task.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            info!(connection = connection_number, peer = %addr, "Client connected");

            let peer = format!("tcp-{connection_number}");
            let handler = SessionHandler::new(reader, writer, registry, peer);

            match handler.run().await {
                Ok(end) => {
                    info!(connection = connection_number, end = ?end, "Client disconnected");
                }
                Err(e) => {
                    debug!(connection = connection_number, error = %e, "Connection closed");
                    info!(connection = connection_number, "Client disconnected");
                }
            }
        });
    }
}

/// Binds `(host, port)` and serves sessions until cancelled.
pub async fn serve_tcp(
    host: &str,
    port: u16,
    registry: Arc<SensorRegistry>,
    cancel_token: CancellationToken,
) -> Result<(), ServerError> {
    let server = TcpServer::bind(host, port, registry).await?;
    server.run(cancel_token).await;
    Ok(())
}

/// Runs exactly one session over the process's stdin and stdout.
pub async fn serve_stdio(registry: Arc<SensorRegistry>) -> Result<SessionEnd, SessionError> {
    let handler = SessionHandler::new(tokio::io::stdin(), tokio::io::stdout(), registry, "stdio");
    handler.run().await
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },
}
