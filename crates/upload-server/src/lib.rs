//! WebSocket upload server for chunkdrop.
//!
//! Accepts any number of client connections on a single WebSocket path.
//! Each connection gets its own [`Session`], which classifies inbound
//! frames (JSON text is control, binary is file data), drives the shared
//! [`TransferRegistry`](chunkdrop_transfer::TransferRegistry) and produces
//! exactly one reply per frame. Transfers left open are cleaned up when
//! the connection goes away.

mod connection;
mod server;
mod session;

pub use server::{ServerConfig, UploadServer};
pub use session::{Session, SessionError};

/// Outbound queue capacity per connection.
///
/// Replies are queued with backpressure: once the queue is full the read
/// pump stops pulling frames until the client drains its replies.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Errors produced by the upload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("server already running")]
    AlreadyRunning,
}
