use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};

use crate::TransferError;

/// Flat directory that receives uploaded artifacts.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    /// Opens `root`, creating it (and its parents) if it does not exist.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Returns the directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the artifact stored for transfer `id`.
    ///
    /// The id prefix keeps identical client filenames from colliding.
    pub fn artifact_name(id: &str, filename: &str) -> String {
        format!("{id}_{filename}")
    }

    /// Full path of the artifact stored for transfer `id`.
    pub fn artifact_path(&self, id: &str, filename: &str) -> PathBuf {
        self.root.join(Self::artifact_name(id, filename))
    }

    /// Creates a new artifact for writing.
    ///
    /// Fails if the file already exists, so a sink is never shared with
    /// another transfer.
    pub async fn create_artifact(
        &self,
        id: &str,
        filename: &str,
    ) -> Result<(PathBuf, File), TransferError> {
        let path = self.artifact_path(id, filename);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Ok((path, file))
    }

    /// Lists every entry name in the directory, sorted.
    ///
    /// Artifacts still being written are included.
    pub async fn list(&self) -> Result<Vec<String>, TransferError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn create_makes_missing_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested").join("uploads");
        let dir = UploadDir::create(&root).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(dir.root(), root.as_path());
    }

    #[test]
    fn artifact_name_prefixes_id() {
        assert_eq!(UploadDir::artifact_name("X", "a.txt"), "X_a.txt");
    }

    #[tokio::test]
    async fn create_artifact_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let dir = UploadDir::create(tmp.path()).await.unwrap();

        let (path, _file) = dir.create_artifact("id1", "a.txt").await.unwrap();
        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "id1_a.txt");

        let err = dir.create_artifact("id1", "a.txt").await.unwrap_err();
        assert!(matches!(err, TransferError::Io(_)));
    }

    #[tokio::test]
    async fn list_is_sorted_and_complete() {
        let tmp = TempDir::new().unwrap();
        let dir = UploadDir::create(tmp.path()).await.unwrap();
        assert!(dir.list().await.unwrap().is_empty());

        dir.create_artifact("b", "two.bin").await.unwrap();
        dir.create_artifact("a", "one.bin").await.unwrap();

        assert_eq!(dir.list().await.unwrap(), vec!["a_one.bin", "b_two.bin"]);
    }

    #[tokio::test]
    async fn list_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let dir = UploadDir::create(tmp.path().join("gone")).await.unwrap();
        std::fs::remove_dir(dir.root()).unwrap();
        assert!(dir.list().await.is_err());
    }
}
