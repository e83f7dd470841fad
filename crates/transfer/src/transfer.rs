use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::progress::Progress;
use crate::types::{ConnectionId, TransferState, TransferSummary};
use crate::TransferError;

/// One upload and its open sink.
///
/// Chunks are accepted only while the state is
/// [`Receiving`](TransferState::Receiving). Finishing or aborting flushes
/// and drops the sink, after which every mutation fails with
/// [`TransferError::NotReceiving`].
pub struct Transfer {
    id: String,
    filename: String,
    path: PathBuf,
    expected_size: i64,
    received_size: u64,
    owner: ConnectionId,
    state: TransferState,
    sink: Option<File>,
}

impl Transfer {
    /// Wraps a freshly created sink.
    pub fn new(
        id: String,
        filename: String,
        path: PathBuf,
        expected_size: i64,
        owner: ConnectionId,
        sink: File,
    ) -> Self {
        Self {
            id,
            filename,
            path,
            expected_size,
            received_size: 0,
            owner,
            state: TransferState::Receiving,
            sink: Some(sink),
        }
    }

    /// Writes a chunk and returns the updated progress.
    ///
    /// The chunk is flushed before returning so write errors surface here
    /// rather than on a later call.
    pub async fn append(&mut self, data: &[u8]) -> Result<Progress, TransferError> {
        let sink = match (self.state, self.sink.as_mut()) {
            (TransferState::Receiving, Some(sink)) => sink,
            _ => return Err(TransferError::NotReceiving(self.id.clone())),
        };

        sink.write_all(data).await?;
        sink.flush().await?;

        self.received_size += data.len() as u64;
        Ok(Progress::new(self.received_size, self.expected_size))
    }

    /// Closes the sink and moves to [`TransferState::Completed`].
    pub async fn finish(&mut self) -> Result<TransferSummary, TransferError> {
        self.close(TransferState::Completed).await
    }

    /// Closes the sink and moves to [`TransferState::Aborted`].
    pub async fn abort(&mut self) -> Result<TransferSummary, TransferError> {
        self.close(TransferState::Aborted).await
    }

    async fn close(&mut self, to: TransferState) -> Result<TransferSummary, TransferError> {
        if self.state.is_terminal() {
            return Err(TransferError::NotReceiving(self.id.clone()));
        }
        self.state = to;

        // The sink is dropped (and the descriptor closed) even if the
        // final flush fails.
        if let Some(mut sink) = self.sink.take() {
            sink.flush().await?;
        }
        Ok(self.summary())
    }

    pub fn summary(&self) -> TransferSummary {
        TransferSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            path: self.path.clone(),
            expected_size: self.expected_size,
            received_size: self.received_size,
            state: self.state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn owner(&self) -> ConnectionId {
        self.owner
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn received_size(&self) -> u64 {
        self.received_size
    }
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("expected_size", &self.expected_size)
            .field("received_size", &self.received_size)
            .field("owner", &self.owner)
            .field("state", &self.state)
            .finish()
    }
}
