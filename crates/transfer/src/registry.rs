use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::progress::Progress;
use crate::storage::UploadDir;
use crate::transfer::Transfer;
use crate::types::{CleanupScope, ConnectionId, TransferSummary};
use crate::validation::sanitize_filename;
use crate::TransferError;

struct Entry {
    owner: ConnectionId,
    transfer: Arc<Mutex<Transfer>>,
}

/// Process-wide map of open transfers, keyed by transfer id.
///
/// Shared between connections through an `Arc`. The map lock is held only
/// for lookups, inserts and removals; each transfer carries its own lock
/// that is held across disk writes, so uploads on different connections do
/// not serialize on each other. A task may take the map lock while holding
/// a transfer lock, never the reverse.
pub struct TransferRegistry {
    dir: UploadDir,
    transfers: Mutex<HashMap<String, Entry>>,
}

impl TransferRegistry {
    pub fn new(dir: UploadDir) -> Self {
        Self {
            dir,
            transfers: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a new transfer owned by `owner` and returns its id.
    ///
    /// The artifact is created before the transfer is registered; if the
    /// filesystem refuses, nothing is registered.
    pub async fn begin(
        &self,
        owner: ConnectionId,
        filename: &str,
        expected_size: i64,
    ) -> Result<String, TransferError> {
        let id = uuid::Uuid::new_v4().to_string();
        let filename = sanitize_filename(filename);
        let (path, sink) = self.dir.create_artifact(&id, &filename).await?;

        info!(
            file_id = %id,
            %owner,
            path = %path.display(),
            expected_size,
            "transfer started"
        );

        let transfer = Transfer::new(id.clone(), filename, path, expected_size, owner, sink);
        self.insert(transfer).await;
        Ok(id)
    }

    /// Registers an already opened transfer.
    pub(crate) async fn insert(&self, transfer: Transfer) {
        let id = transfer.id().to_string();
        let entry = Entry {
            owner: transfer.owner(),
            transfer: Arc::new(Mutex::new(transfer)),
        };
        self.transfers.lock().await.insert(id, entry);
    }

    /// Appends a chunk to transfer `id`.
    ///
    /// A write failure aborts the transfer: the entry is removed and the
    /// sink closed before the I/O error is returned.
    pub async fn append(&self, id: &str, data: &[u8]) -> Result<Progress, TransferError> {
        let handle = self
            .lookup(id)
            .await
            .ok_or_else(|| TransferError::NotFound(id.to_string()))?;
        let mut transfer = handle.lock().await;

        match transfer.append(data).await {
            Ok(progress) => {
                debug!(
                    file_id = %id,
                    bytes = data.len(),
                    received = progress.received_size,
                    percent = progress.percent,
                    "chunk written"
                );
                Ok(progress)
            }
            Err(TransferError::Io(e)) => {
                warn!(file_id = %id, "chunk write failed, aborting transfer: {e}");
                self.transfers.lock().await.remove(id);
                if let Err(close_err) = transfer.abort().await {
                    debug!(file_id = %id, "close after write failure: {close_err}");
                }
                Err(TransferError::Io(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Finishes transfer `id`.
    ///
    /// Returns `Ok(None)` when the id is unknown (never started, already
    /// finished, or cleaned up).
    pub async fn finish(&self, id: &str) -> Result<Option<TransferSummary>, TransferError> {
        let removed = self.transfers.lock().await.remove(id);
        let Some(entry) = removed else {
            debug!(file_id = %id, "finish for unknown transfer");
            return Ok(None);
        };

        let summary = entry.transfer.lock().await.finish().await?;
        info!(
            file_id = %id,
            filename = %summary.filename,
            path = %summary.path.display(),
            received = summary.received_size,
            expected = summary.expected_size,
            "transfer completed"
        );
        Ok(Some(summary))
    }

    /// Closes the transfers affected by the disconnect of `owner`.
    ///
    /// Returns the number of transfers closed.
    pub async fn cleanup(&self, scope: CleanupScope, owner: ConnectionId) -> usize {
        match scope {
            CleanupScope::Connection => self.cleanup_connection(owner).await,
            CleanupScope::Global => self.cleanup_all().await,
        }
    }

    /// Closes only the transfers started by `owner`.
    pub async fn cleanup_connection(&self, owner: ConnectionId) -> usize {
        let removed: Vec<(String, Entry)> = {
            let mut map = self.transfers.lock().await;
            let ids: Vec<String> = map
                .iter()
                .filter(|(_, entry)| entry.owner == owner)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| map.remove(&id).map(|entry| (id, entry)))
                .collect()
        };
        close_all(removed).await
    }

    /// Closes every open transfer and clears the registry.
    pub async fn cleanup_all(&self) -> usize {
        let removed: Vec<(String, Entry)> = self.transfers.lock().await.drain().collect();
        close_all(removed).await
    }

    /// Returns `true` if `id` is registered.
    pub async fn contains(&self, id: &str) -> bool {
        self.transfers.lock().await.contains_key(id)
    }

    /// Number of open transfers.
    pub async fn len(&self) -> usize {
        self.transfers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transfers.lock().await.is_empty()
    }

    /// Lists the upload directory, including artifacts still receiving.
    pub async fn list_files(&self) -> Result<Vec<String>, TransferError> {
        self.dir.list().await
    }

    async fn lookup(&self, id: &str) -> Option<Arc<Mutex<Transfer>>> {
        self.transfers
            .lock()
            .await
            .get(id)
            .map(|entry| Arc::clone(&entry.transfer))
    }
}

async fn close_all(removed: Vec<(String, Entry)>) -> usize {
    let count = removed.len();
    for (id, entry) in removed {
        match entry.transfer.lock().await.abort().await {
            Ok(summary) => info!(
                file_id = %id,
                owner = %entry.owner,
                path = %summary.path.display(),
                received = summary.received_size,
                "transfer aborted by cleanup"
            ),
            Err(e) => warn!(file_id = %id, "failed to close transfer during cleanup: {e}"),
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransferState;
    use tempfile::TempDir;

    async fn registry(tmp: &TempDir) -> TransferRegistry {
        TransferRegistry::new(UploadDir::create(tmp.path()).await.unwrap())
    }

    #[tokio::test]
    async fn begin_append_finish() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        let owner = ConnectionId::next();

        let id = reg.begin(owner, "a.txt", 10).await.unwrap();
        assert!(reg.contains(&id).await);

        let p = reg.append(&id, b"0123456789").await.unwrap();
        assert_eq!(p.percent, 100);

        let summary = reg.finish(&id).await.unwrap().unwrap();
        assert_eq!(summary.state, TransferState::Completed);
        assert_eq!(summary.received_size, 10);
        assert!(!reg.contains(&id).await);

        let path = tmp.path().join(format!("{id}_a.txt"));
        assert_eq!(std::fs::read(path).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_ends_at_100() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        let id = reg.begin(ConnectionId::next(), "m.bin", 100).await.unwrap();

        let mut last = 0;
        for size in [1usize, 9, 33, 7, 25, 25] {
            let p = reg.append(&id, &vec![0u8; size]).await.unwrap();
            assert!(p.percent >= last);
            last = p.percent;
        }
        assert_eq!(last, 100);
    }

    #[tokio::test]
    async fn finish_without_chunks_then_append_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        let id = reg.begin(ConnectionId::next(), "empty", 5).await.unwrap();

        let summary = reg.finish(&id).await.unwrap().unwrap();
        assert_eq!(summary.received_size, 0);
        assert!(reg.is_empty().await);

        let err = reg.append(&id, b"late").await.unwrap_err();
        assert!(matches!(err, TransferError::NotFound(_)));
    }

    #[tokio::test]
    async fn finish_unknown_is_none() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        assert!(reg.finish("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finish_twice_is_none_the_second_time() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        let id = reg.begin(ConnectionId::next(), "x", 1).await.unwrap();
        assert!(reg.finish(&id).await.unwrap().is_some());
        assert!(reg.finish(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_begins_get_distinct_ids() {
        let tmp = TempDir::new().unwrap();
        let reg = Arc::new(registry(&tmp).await);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let reg = Arc::clone(&reg);
            handles.push(tokio::spawn(async move {
                reg.begin(ConnectionId::next(), "same.txt", 1).await.unwrap()
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for h in handles {
            assert!(ids.insert(h.await.unwrap()));
        }
        assert_eq!(ids.len(), 16);
        assert_eq!(reg.len().await, 16);
        assert_eq!(reg.list_files().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn list_includes_partial_artifacts() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        let id = reg.begin(ConnectionId::next(), "part.bin", 100).await.unwrap();
        reg.append(&id, b"half").await.unwrap();

        let files = reg.list_files().await.unwrap();
        assert_eq!(files, vec![format!("{id}_part.bin")]);
    }

    #[tokio::test]
    async fn begin_sanitizes_filename() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        let id = reg
            .begin(ConnectionId::next(), "../../etc/passwd", 1)
            .await
            .unwrap();

        assert_eq!(reg.list_files().await.unwrap(), vec![format!("{id}_passwd")]);
        assert!(tmp.path().join(format!("{id}_passwd")).exists());
    }

    #[tokio::test]
    async fn begin_fails_when_directory_is_gone() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("uploads");
        let reg = TransferRegistry::new(UploadDir::create(&root).await.unwrap());
        std::fs::remove_dir(&root).unwrap();

        let err = reg.begin(ConnectionId::next(), "a", 1).await.unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn cleanup_connection_only_closes_owned_transfers() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        let a = ConnectionId::next();
        let b = ConnectionId::next();

        let a1 = reg.begin(a, "a1", 10).await.unwrap();
        let a2 = reg.begin(a, "a2", 10).await.unwrap();
        let b1 = reg.begin(b, "b1", 10).await.unwrap();

        assert_eq!(reg.cleanup(CleanupScope::Connection, a).await, 2);
        assert!(!reg.contains(&a1).await);
        assert!(!reg.contains(&a2).await);
        assert!(reg.contains(&b1).await);

        // Artifacts stay on disk after cleanup.
        assert_eq!(reg.list_files().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn cleanup_global_closes_everything() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        let a = ConnectionId::next();
        let b = ConnectionId::next();

        reg.begin(a, "a1", 10).await.unwrap();
        let b1 = reg.begin(b, "b1", 10).await.unwrap();

        assert_eq!(reg.cleanup(CleanupScope::Global, a).await, 2);
        assert!(reg.is_empty().await);
        assert!(matches!(
            reg.append(&b1, b"x").await,
            Err(TransferError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn cleanup_on_empty_registry() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        assert_eq!(reg.cleanup_all().await, 0);
        assert_eq!(reg.cleanup_connection(ConnectionId::next()).await, 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn write_failure_aborts_and_unregisters() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp).await;
        let sink = tokio::fs::OpenOptions::new()
            .write(true)
            .open("/dev/full")
            .await
            .unwrap();
        reg.insert(Transfer::new(
            "full".into(),
            "full.bin".into(),
            "/dev/full".into(),
            4,
            ConnectionId::next(),
            sink,
        ))
        .await;
        assert!(reg.contains("full").await);

        let err = reg.append("full", b"data").await.unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
        assert!(!reg.contains("full").await);
        assert!(reg.finish("full").await.unwrap().is_none());
    }
}
