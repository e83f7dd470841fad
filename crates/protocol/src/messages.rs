use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_FILENAME;

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// Control messages sent by an uploading client as JSON text frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begins a new transfer and binds it to the sending connection.
    Start {
        #[serde(default = "default_filename")]
        filename: String,
        /// Declared size in bytes. Only used for progress reporting.
        #[serde(default)]
        total_size: i64,
    },

    /// Finalizes a transfer.
    End {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_id: Option<String>,
    },

    /// Requests the upload directory listing.
    ListFiles,

    /// Forward compatibility: unknown `type` values deserialize here.
    #[serde(other)]
    Unknown,
}

fn default_filename() -> String {
    DEFAULT_FILENAME.to_string()
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// Replies sent back on the connection that issued the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    StartAck { file_id: String },

    /// Cumulative progress of the active transfer, 0 to 100.
    Progress { file_id: String, progress: u8 },

    UploadComplete { message: String },

    FileList { files: Vec<String> },

    Error { message: String },
}

impl ServerMessage {
    /// Builds an `error` reply.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns `true` for `error` replies.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
