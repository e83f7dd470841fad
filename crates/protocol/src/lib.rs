//! Wire protocol for chunkdrop uploads.
//!
//! Control traffic is flat JSON objects tagged by a `type` field; file
//! content travels as raw binary WebSocket frames with no header.

pub mod constants;
pub mod envelope;
pub mod messages;

pub use envelope::{decode_control, encode_reply};
pub use messages::{ClientMessage, ServerMessage};

/// Errors produced while decoding control messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The text frame is not JSON at all.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// Valid JSON that does not match any control message shape.
    #[error("invalid message: {0}")]
    InvalidMessage(#[source] serde_json::Error),

    #[error("failed to encode reply: {0}")]
    Encode(#[source] serde_json::Error),
}
