// Filesystem output store
// Persists invocation output verbatim as plain text

use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use coderelay_core::port::OutputStore;

/// Writes output files with `tokio::fs`, creating parent directories on
/// demand. Existing files are overwritten.
pub struct FsOutputStore;

impl FsOutputStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FsOutputStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputStore for FsOutputStore {
    async fn persist(&self, path: &Path, text: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, text).await?;
        info!(path = %path.display(), bytes = text.len(), "Persisted invocation output");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persist_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c/output.txt");

        let store = FsOutputStore::new();
        store.persist(&path, "review text").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "review text");
    }

    #[tokio::test]
    async fn test_persist_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");

        let store = FsOutputStore::new();
        store.persist(&path, "first").await.unwrap();
        store.persist(&path, "second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
