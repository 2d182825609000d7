// Invocation Domain Model

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasoning effort requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Low,
    Medium,
    High,
}

impl Default for EffortLevel {
    fn default() -> Self {
        EffortLevel::High
    }
}

impl EffortLevel {
    /// Lowercase form passed on the child command line
    pub fn as_str(&self) -> &'static str {
        match self {
            EffortLevel::Low => "low",
            EffortLevel::Medium => "medium",
            EffortLevel::High => "high",
        }
    }
}

impl std::fmt::Display for EffortLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EffortLevel {
    type Err = crate::domain::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(EffortLevel::Low),
            "medium" => Ok(EffortLevel::Medium),
            "high" => Ok(EffortLevel::High),
            other => Err(crate::domain::DomainError::InvalidEffortLevel(
                other.to_string(),
            )),
        }
    }
}

/// A single request to run the agent binary.
///
/// The payload is the full prompt text. It is delivered to the child over
/// stdin and must never appear on the command line: argv is visible to every
/// user on the host and is truncated by the OS at a few hundred KB, while
/// prompts are routinely larger and may contain secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub payload: String,
    pub model: String,
    pub effort: EffortLevel,
    /// Per-invocation override of the termination budget, in milliseconds.
    /// `None` uses the configured default.
    pub timeout_override_ms: Option<i64>,
}

impl InvocationRequest {
    pub fn new(payload: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            model: model.into(),
            effort: EffortLevel::default(),
            timeout_override_ms: None,
        }
    }

    pub fn with_effort(mut self, effort: EffortLevel) -> Self {
        self.effort = effort;
        self
    }

    pub fn with_timeout_override(mut self, timeout_ms: i64) -> Self {
        self.timeout_override_ms = Some(timeout_ms);
        self
    }
}

/// Successful invocation result: the child exited zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationOutput {
    /// Complete accumulated stdout of the child
    pub stdout: String,
    /// Wall-clock duration from spawn to resolution, in milliseconds
    pub duration_ms: i64,
}

/// Lifecycle of one invocation. Only used for structured logging; an
/// invocation is never observable from outside in a non-terminal state.
///
/// Transitions are one-way: Running -> Terminating -> Killing, and any of
/// them -> Resolved. Resolution happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeState {
    Running,
    Terminating,
    Killing,
    Resolved,
}

impl std::fmt::Display for InvokeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeState::Running => write!(f, "RUNNING"),
            InvokeState::Terminating => write!(f, "TERMINATING"),
            InvokeState::Killing => write!(f, "KILLING"),
            InvokeState::Resolved => write!(f, "RESOLVED"),
        }
    }
}

/// Failure taxonomy for a single invocation.
///
/// Every failure resolves the invocation; none of them is retried
/// automatically and none of them crashes the host.
#[derive(Error, Debug)]
pub enum InvokeError {
    /// The OS refused to start the child (binary missing, permissions, ...)
    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    /// The child spawned but exposed no stdin pipe
    #[error("stdin unavailable on spawned process")]
    StreamUnavailable,

    /// Writing or closing the payload stream failed (e.g. child exited early
    /// and the pipe broke)
    #[error("failed to write payload to stdin: {0}")]
    StdinWriteFailed(String),

    /// The termination budget elapsed before the child exited
    #[error("timed out after {0} ms")]
    Timeout(i64),

    /// The child exited non-zero; stderr is carried as the diagnostic
    #[error("exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
}

impl InvokeError {
    /// Stable machine-readable kind, used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            InvokeError::SpawnFailed(_) => "spawn_failed",
            InvokeError::StreamUnavailable => "stream_unavailable",
            InvokeError::StdinWriteFailed(_) => "stdin_write_failed",
            InvokeError::Timeout(_) => "timeout",
            InvokeError::NonZeroExit { .. } => "non_zero_exit",
        }
    }
}
