// Port Layer - Interfaces for external dependencies

pub mod clock; // For deterministic timers
pub mod output_store;
pub mod process_runner;

// Re-exports
pub use clock::{Clock, SystemClock};
pub use output_store::OutputStore;
pub use process_runner::{CommandSpec, PayloadSink, ProcessEvent, ProcessRunner, SpawnedProcess};
