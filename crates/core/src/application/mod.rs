// Application Layer - Use Cases and Business Logic

pub mod invoker;

// Re-exports
pub use invoker::{InvokerConfig, ProcessInvoker};
