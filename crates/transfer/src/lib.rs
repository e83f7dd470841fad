//! File transfer bookkeeping for chunkdrop.
//!
//! A [`Transfer`] owns the open sink of one upload; the
//! [`TransferRegistry`] maps transfer ids to transfers and is shared by
//! every connection of the server. Artifacts land in a flat
//! [`UploadDir`] as `{id}_{filename}`.

mod progress;
mod registry;
mod storage;
mod transfer;
mod types;
mod validation;

pub use progress::{Progress, percent};
pub use registry::TransferRegistry;
pub use storage::UploadDir;
pub use transfer::Transfer;
pub use types::{CleanupScope, ConnectionId, TransferState, TransferSummary};
pub use validation::sanitize_filename;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer not found: {0}")]
    NotFound(String),

    #[error("transfer no longer receiving: {0}")]
    NotReceiving(String),

    #[error("invalid cleanup scope: {0}")]
    InvalidScope(String),
}
