//! Per-connection session state and message dispatch.

use std::sync::Arc;

use chunkdrop_protocol::constants::{
    ERR_INVALID_JSON, ERR_INVALID_TRANSFER, ERR_UNKNOWN_TYPE, UPLOAD_COMPLETE_MESSAGE,
};
use chunkdrop_protocol::{ClientMessage, ProtocolError, ServerMessage, decode_control};
use chunkdrop_transfer::{CleanupScope, ConnectionId, TransferError, TransferRegistry};

/// Failure of a single inbound frame.
///
/// Never fatal for the connection: every variant maps to an `error` reply
/// through [`SessionError::into_reply`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unknown message type")]
    UnknownType,

    #[error("binary frame without an active transfer")]
    NoActiveTransfer,

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl SessionError {
    /// Converts the error into the reply sent to the client.
    pub fn into_reply(self) -> ServerMessage {
        match self {
            Self::Protocol(ProtocolError::InvalidJson(_)) => ServerMessage::error(ERR_INVALID_JSON),
            Self::Protocol(e) => ServerMessage::error(e.to_string()),
            Self::UnknownType => ServerMessage::error(ERR_UNKNOWN_TYPE),
            Self::NoActiveTransfer
            | Self::Transfer(TransferError::NotFound(_) | TransferError::NotReceiving(_)) => {
                ServerMessage::error(ERR_INVALID_TRANSFER)
            }
            Self::Transfer(e) => ServerMessage::error(e.to_string()),
        }
    }

    fn is_io(&self) -> bool {
        matches!(self, Self::Transfer(TransferError::Io(_)))
    }
}

/// State of one client connection.
///
/// Owned by the connection's read pump, so frames are handled strictly in
/// arrival order. At most one transfer is bound at a time; binary frames
/// always go to that transfer.
pub struct Session {
    id: ConnectionId,
    registry: Arc<TransferRegistry>,
    cleanup_scope: CleanupScope,
    active_transfer: Option<String>,
}

impl Session {
    pub fn new(registry: Arc<TransferRegistry>, cleanup_scope: CleanupScope) -> Self {
        Self {
            id: ConnectionId::next(),
            registry,
            cleanup_scope,
            active_transfer: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Id of the transfer binary frames are currently appended to.
    pub fn active_transfer(&self) -> Option<&str> {
        self.active_transfer.as_deref()
    }

    /// Handles a text frame and returns its reply.
    pub async fn handle_text(&mut self, text: &str) -> ServerMessage {
        let result = match decode_control(text) {
            Ok(msg) => self.dispatch(msg).await,
            Err(e) => Err(e.into()),
        };
        self.reply(result)
    }

    /// Handles a binary frame and returns its reply.
    pub async fn handle_binary(&mut self, data: &[u8]) -> ServerMessage {
        let result = self.on_chunk(data).await;
        self.reply(result)
    }

    /// Runs disconnect cleanup for this connection.
    ///
    /// Depending on the configured [`CleanupScope`] this closes either the
    /// transfers this connection started or every open transfer.
    pub async fn close(self) {
        let closed = self.registry.cleanup(self.cleanup_scope, self.id).await;
        if closed > 0 {
            tracing::info!(
                conn = %self.id,
                scope = %self.cleanup_scope,
                closed,
                "closed unfinished transfers on disconnect"
            );
        }
    }

    async fn dispatch(&mut self, msg: ClientMessage) -> Result<ServerMessage, SessionError> {
        match msg {
            ClientMessage::Start {
                filename,
                total_size,
            } => self.on_start(&filename, total_size).await,
            ClientMessage::End { file_id } => self.on_end(file_id.as_deref()).await,
            ClientMessage::ListFiles => self.on_list_files().await,
            ClientMessage::Unknown => Err(SessionError::UnknownType),
        }
    }

    async fn on_start(
        &mut self,
        filename: &str,
        total_size: i64,
    ) -> Result<ServerMessage, SessionError> {
        let id = self.registry.begin(self.id, filename, total_size).await?;

        // The previous transfer stays registered; only the binding moves.
        if let Some(previous) = self.active_transfer.replace(id.clone()) {
            tracing::debug!(conn = %self.id, %previous, file_id = %id, "active transfer rebound");
        }
        Ok(ServerMessage::StartAck { file_id: id })
    }

    async fn on_end(&mut self, file_id: Option<&str>) -> Result<ServerMessage, SessionError> {
        if let Some(id) = file_id {
            if self.active_transfer.as_deref() == Some(id) {
                self.active_transfer = None;
            }
            self.registry.finish(id).await?;
        }
        Ok(ServerMessage::UploadComplete {
            message: UPLOAD_COMPLETE_MESSAGE.to_string(),
        })
    }

    async fn on_list_files(&self) -> Result<ServerMessage, SessionError> {
        let files = self.registry.list_files().await?;
        Ok(ServerMessage::FileList { files })
    }

    async fn on_chunk(&mut self, data: &[u8]) -> Result<ServerMessage, SessionError> {
        let id = self
            .active_transfer
            .clone()
            .ok_or(SessionError::NoActiveTransfer)?;

        match self.registry.append(&id, data).await {
            Ok(progress) => Ok(ServerMessage::Progress {
                file_id: id,
                progress: progress.percent,
            }),
            Err(e) => {
                // Either the transfer is gone or the write aborted it; in
                // both cases the binding is stale.
                self.active_transfer = None;
                Err(e.into())
            }
        }
    }

    fn reply(&self, result: Result<ServerMessage, SessionError>) -> ServerMessage {
        match result {
            Ok(reply) => reply,
            Err(e) => {
                if e.is_io() {
                    tracing::error!(conn = %self.id, "message handling failed: {e}");
                } else {
                    tracing::warn!(conn = %self.id, "rejected message: {e}");
                }
                e.into_reply()
            }
        }
    }
}
