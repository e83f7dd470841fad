use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::TransferError;

/// Identity of one WebSocket connection, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next connection id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle state of a transfer.
///
/// `Receiving` is the only state that accepts chunks; the other two are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Receiving,
    Completed,
    Aborted,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Receiving)
    }
}

/// Snapshot of a transfer taken when it leaves the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub id: String,
    pub filename: String,
    pub path: PathBuf,
    pub expected_size: i64,
    pub received_size: u64,
    pub state: TransferState,
}

/// Which transfers are closed when a connection goes away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupScope {
    /// Close only the transfers the disconnecting connection started.
    #[default]
    Connection,
    /// Close every open transfer in the process (single-tenant mode).
    Global,
}

impl FromStr for CleanupScope {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connection" => Ok(Self::Connection),
            "global" => Ok(Self::Global),
            other => Err(TransferError::InvalidScope(other.to_string())),
        }
    }
}

impl fmt::Display for CleanupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => f.write_str("connection"),
            Self::Global => f.write_str("global"),
        }
    }
}
