use std::time::Duration;

/// Maximum WebSocket message size in bytes (50 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;

/// How often the server pings an idle client.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Time to wait for a pong (or any other inbound frame) before the
/// connection is considered dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// Default WebSocket path.
pub const WS_PATH: &str = "/ws";

/// Filename used when `start` omits one.
pub const DEFAULT_FILENAME: &str = "unnamed_file";

/// Message carried by every `upload_complete` reply.
pub const UPLOAD_COMPLETE_MESSAGE: &str = "File uploaded successfully";

/// Reply for text frames that are not JSON.
pub const ERR_INVALID_JSON: &str = "Invalid JSON format";

/// Reply for binary frames with no usable active transfer.
pub const ERR_INVALID_TRANSFER: &str = "Invalid file transfer";

/// Reply for control messages with an unrecognised `type`.
pub const ERR_UNKNOWN_TYPE: &str = "Unknown message type";
