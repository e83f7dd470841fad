//! Upload WebSocket server.
//!
//! Listens on a TCP port, upgrades HTTP GET on the configured path to
//! WebSocket, and serves every accepted client on its own task.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;

use chunkdrop_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PATH, WS_PING_PERIOD, WS_PONG_WAIT};
use chunkdrop_transfer::{CleanupScope, TransferRegistry};

use crate::ServerError;
use crate::connection::{self, Keepalive};
use crate::session::Session;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: IpAddr,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Request path that may be upgraded to WebSocket.
    pub path: String,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    /// Which transfers are closed when a client disconnects.
    pub cleanup_scope: CleanupScope,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            path: WS_PATH.to_string(),
            max_message_size: WS_MAX_MESSAGE_SIZE,
            ping_interval: WS_PING_PERIOD,
            pong_timeout: WS_PONG_WAIT,
            cleanup_scope: CleanupScope::default(),
        }
    }
}

/// The upload WebSocket server.
pub struct UploadServer {
    config: ServerConfig,
    registry: Arc<TransferRegistry>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
    connections: AtomicUsize,
}

impl UploadServer {
    /// Creates a new server backed by `registry`.
    pub fn new(config: ServerConfig, registry: Arc<TransferRegistry>) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry,
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
            connections: AtomicUsize::new(0),
        })
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Number of clients currently connected.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Returns the shared transfer registry.
    pub fn registry(&self) -> &Arc<TransferRegistry> {
        &self.registry
    }

    /// Gracefully shuts down the server and every connection.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the server until [`shutdown`](Self::shutdown).
    ///
    /// On shutdown every transfer still open is closed.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = {
            let mut local_addr = self.local_addr.lock().await;
            if local_addr.is_some() {
                return Err(ServerError::AlreadyRunning);
            }
            let listener =
                TcpListener::bind(SocketAddr::new(self.config.host, self.config.port)).await?;
            *local_addr = Some(listener.local_addr()?);
            listener
        };
        tracing::info!(
            "upload server listening on ws://{}{}",
            listener.local_addr()?,
            self.config.path
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    let closed = self.registry.cleanup_all().await;
                    if closed > 0 {
                        tracing::info!(closed, "closed open transfers on shutdown");
                    }
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    tracing::warn!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Handles a single TCP connection: upgrades to WS and serves the client.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_message_size);

        let path = self.config.path.clone();
        let check_path = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            if req.uri().path() == path {
                return Ok(resp);
            }
            tracing::warn!(%peer_addr, path = %req.uri().path(), "rejected upgrade for unknown path");
            let mut err = ErrorResponse::new(Some("not found".into()));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        };

        let ws_stream = accept_hdr_async_with_config(stream, check_path, Some(ws_config)).await?;

        let session = Session::new(Arc::clone(&self.registry), self.config.cleanup_scope);
        tracing::info!(%peer_addr, conn = %session.id(), "client connected");

        let keepalive = Keepalive {
            ping_interval: self.config.ping_interval,
            pong_timeout: self.config.pong_timeout,
        };

        self.connections.fetch_add(1, Ordering::SeqCst);
        connection::serve(ws_stream, session, keepalive, self.cancel.child_token()).await;
        self.connections.fetch_sub(1, Ordering::SeqCst);

        Ok(())
    }
}
