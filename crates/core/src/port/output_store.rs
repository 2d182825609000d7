// Output Store Port

use async_trait::async_trait;
use std::path::Path;

/// Destination for persisted invocation output
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Write `text` verbatim to `path`, creating parent directories as
    /// needed and overwriting any existing file
    async fn persist(&self, path: &Path, text: &str) -> std::io::Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::io;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// In-memory output store for testing
    pub struct MemoryOutputStore {
        writes: Mutex<Vec<(PathBuf, String)>>,
        fail_next: Mutex<Option<String>>,
    }

    impl MemoryOutputStore {
        pub fn new() -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail_next: Mutex::new(None),
            }
        }

        /// Make the next persist call fail with the given message
        pub fn fail_next(&self, message: impl Into<String>) {
            *self.fail_next.lock().unwrap() = Some(message.into());
        }

        pub fn writes(&self) -> Vec<(PathBuf, String)> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl Default for MemoryOutputStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl OutputStore for MemoryOutputStore {
        async fn persist(&self, path: &Path, text: &str) -> io::Result<()> {
            if let Some(message) = self.fail_next.lock().unwrap().take() {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, message));
            }
            self.writes
                .lock()
                .unwrap()
                .push((path.to_path_buf(), text.to_string()));
            Ok(())
        }
    }
}
