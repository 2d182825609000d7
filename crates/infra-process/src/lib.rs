// Coderelay Infra-Process - OS adapters
// Implements the process-runner and output-store ports from core

pub mod fs_store;
pub mod tokio_runner;

pub use fs_store::FsOutputStore;
pub use tokio_runner::TokioProcessRunner;
