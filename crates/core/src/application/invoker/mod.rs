// Process Invoker - managed execution of one codex child per request

#[cfg(test)]
#[path = "invoker_test.rs"]
mod invoker_test;

use crate::domain::{InvocationOutput, InvocationRequest, InvokeError, InvokeState};
use crate::port::process_runner::{CommandSpec, ProcessEvent, SpawnedProcess};
use crate::port::{Clock, ProcessRunner};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Termination budget applied when a request carries no override
pub const DEFAULT_TIMEOUT_MS: i64 = 300_000;

/// Grace period between the graceful signal and the forced kill
pub const KILL_GRACE_MS: u64 = 2_000;

/// Environment variable carrying the API credential into the child
const CREDENTIAL_ENV: &str = "OPENAI_API_KEY";

/// Invoker configuration. The credential is explicit constructor state so
/// tests can inject a fake one; the invoker never reads the environment.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Child program name, resolved via the standard search path
    pub program: String,
    /// API credential layered into the child environment; `None` leaves the
    /// inherited environment untouched
    pub api_key: Option<String>,
    pub default_timeout_ms: i64,
    pub kill_grace_ms: u64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            program: "codex".to_string(),
            api_key: None,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            kill_grace_ms: KILL_GRACE_MS,
        }
    }
}

/// Runs one external `codex exec` child per request.
///
/// `invoke` is the single suspension point a caller sees: it resolves
/// exactly once, with either the child's complete stdout or a typed
/// failure, and never panics across the boundary. Stream events and both
/// timers are internal; concurrent invocations share nothing.
pub struct ProcessInvoker {
    config: InvokerConfig,
    clock: Arc<dyn Clock>,
    runner: Arc<dyn ProcessRunner>,
}

impl ProcessInvoker {
    pub fn new(
        config: InvokerConfig,
        clock: Arc<dyn Clock>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            config,
            clock,
            runner,
        }
    }

    /// Whether a credential was configured at construction. The operation
    /// handler checks this before dispatching so a missing key is rejected
    /// without spawning anything.
    pub fn credential_present(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Build the child command line.
    ///
    /// The payload is deliberately absent: argv is readable by every user
    /// on the host and capped in length by the OS (~128 KB on common
    /// platforms), so the prompt only ever travels over stdin.
    fn build_command(&self, request: &InvocationRequest) -> CommandSpec {
        let mut env = Vec::new();
        if let Some(key) = &self.config.api_key {
            env.push((CREDENTIAL_ENV.to_string(), key.clone()));
        }
        CommandSpec {
            program: self.config.program.clone(),
            args: vec![
                "exec".to_string(),
                "--full-auto".to_string(),
                "-m".to_string(),
                request.model.clone(),
                "-c".to_string(),
                format!("model_reasoning_effort={}", request.effort),
            ],
            env,
        }
    }

    /// Run one invocation to resolution.
    ///
    /// Resolution paths:
    /// - child exits 0 within budget -> `Ok(InvocationOutput)`
    /// - child exits non-zero -> `Err(NonZeroExit)` carrying its stderr
    /// - budget elapses -> `Err(Timeout)` immediately; SIGTERM is sent and
    ///   a SIGKILL escalation keeps running in the background
    /// - spawn or stdin trouble -> `Err(SpawnFailed | StreamUnavailable |
    ///   StdinWriteFailed)`
    pub async fn invoke(
        &self,
        request: InvocationRequest,
    ) -> Result<InvocationOutput, InvokeError> {
        let invocation_id = uuid::Uuid::new_v4().to_string();
        let timeout_ms = request
            .timeout_override_ms
            .unwrap_or(self.config.default_timeout_ms);
        let started_at = self.clock.now_millis();

        info!(
            invocation_id = %invocation_id,
            program = %self.config.program,
            model = %request.model,
            effort = %request.effort,
            timeout_ms = %timeout_ms,
            payload_bytes = request.payload.len(),
            "Starting invocation"
        );

        let spec = self.build_command(&request);
        let SpawnedProcess {
            pid,
            stdin,
            mut events,
        } = match self.runner.spawn(spec).await {
            Ok(process) => process,
            Err(e) => {
                warn!(invocation_id = %invocation_id, error = %e, "Failed to spawn child");
                return Err(InvokeError::SpawnFailed(e.to_string()));
            }
        };

        let mut sink = match stdin {
            Some(sink) => sink,
            None => {
                // The child is running but unreachable; reap it before
                // resolving so this fast path cannot leak a process.
                warn!(invocation_id = %invocation_id, pid = ?pid, "Child exposed no stdin pipe");
                if let Some(pid) = pid {
                    let _ = self.runner.kill(pid).await;
                }
                return Err(InvokeError::StreamUnavailable);
            }
        };

        // Payload delivery runs concurrently with output capture: a child
        // may emit output, or die, before consuming all of its stdin.
        let payload = request.payload.as_bytes();
        let deliver = async {
            sink.write_all(payload).await?;
            sink.shutdown().await
        };
        tokio::pin!(deliver);
        let mut delivered = false;

        let mut budget = self.clock.sleep(timeout_ms.max(0) as u64);

        let mut stdout_buf: Vec<u8> = Vec::new();
        let mut stderr_buf: Vec<u8> = Vec::new();

        loop {
            tokio::select! {
                // Stdin errors resolve ahead of a simultaneous exit event,
                // and a completed exit beats a simultaneous timeout.
                biased;

                result = &mut deliver, if !delivered => match result {
                    Ok(()) => delivered = true,
                    Err(e) => {
                        warn!(invocation_id = %invocation_id, error = %e, "Payload delivery failed");
                        if let Some(pid) = pid {
                            let _ = self.runner.kill(pid).await;
                        }
                        return Err(InvokeError::StdinWriteFailed(e.to_string()));
                    }
                },

                maybe_event = events.recv() => match maybe_event {
                    Some(ProcessEvent::Stdout(chunk)) => stdout_buf.extend_from_slice(&chunk),
                    Some(ProcessEvent::Stderr(chunk)) => stderr_buf.extend_from_slice(&chunk),
                    Some(ProcessEvent::Exited { code }) => {
                        let duration_ms = self.clock.now_millis() - started_at;
                        return self.resolve_exit(
                            &invocation_id,
                            code,
                            &stdout_buf,
                            &stderr_buf,
                            duration_ms,
                        );
                    }
                    None => {
                        // Channel closed without an exit event: the launch
                        // infrastructure broke, not the child.
                        error!(
                            invocation_id = %invocation_id,
                            "Event stream closed before the child reported an exit"
                        );
                        return Err(InvokeError::SpawnFailed(
                            "process event stream closed before exit".to_string(),
                        ));
                    }
                },

                _ = &mut budget => {
                    warn!(
                        invocation_id = %invocation_id,
                        pid = ?pid,
                        timeout_ms = %timeout_ms,
                        state = %InvokeState::Terminating,
                        "Invocation timed out, sending graceful termination"
                    );
                    if let Some(pid) = pid {
                        if let Err(e) = self.runner.terminate(pid).await {
                            warn!(invocation_id = %invocation_id, pid = %pid, error = %e, "SIGTERM failed");
                        }
                        self.spawn_kill_escalation(invocation_id, pid);
                    }
                    return Err(InvokeError::Timeout(timeout_ms));
                }
            }
        }
    }

    fn resolve_exit(
        &self,
        invocation_id: &str,
        code: Option<i32>,
        stdout_buf: &[u8],
        stderr_buf: &[u8],
        duration_ms: i64,
    ) -> Result<InvocationOutput, InvokeError> {
        let stderr = String::from_utf8_lossy(stderr_buf).to_string();
        match code {
            Some(0) => {
                let stdout = String::from_utf8_lossy(stdout_buf).to_string();
                info!(
                    invocation_id = %invocation_id,
                    duration_ms = %duration_ms,
                    stdout_bytes = stdout.len(),
                    state = %InvokeState::Resolved,
                    "Invocation completed"
                );
                if !stderr.is_empty() {
                    debug!(invocation_id = %invocation_id, stderr = %stderr, "Child diagnostics");
                }
                Ok(InvocationOutput {
                    stdout,
                    duration_ms,
                })
            }
            code => {
                // A signal-terminated child reports no code; -1 is the
                // conventional sentinel.
                let code = code.unwrap_or(-1);
                warn!(
                    invocation_id = %invocation_id,
                    exit_code = %code,
                    duration_ms = %duration_ms,
                    state = %InvokeState::Resolved,
                    "Child exited non-zero"
                );
                Err(InvokeError::NonZeroExit { code, stderr })
            }
        }
    }

    /// Detached escalation: give the child a grace period after SIGTERM,
    /// then SIGKILL it if it still exists. Deliberately runs past
    /// resolution so a stuck child cannot outlive its invocation
    /// indefinitely.
    fn spawn_kill_escalation(&self, invocation_id: String, pid: i32) {
        let clock = Arc::clone(&self.clock);
        let runner = Arc::clone(&self.runner);
        let grace_ms = self.config.kill_grace_ms;
        tokio::spawn(async move {
            clock.sleep(grace_ms).await;
            if runner.is_alive(pid) {
                warn!(
                    invocation_id = %invocation_id,
                    pid = %pid,
                    state = %InvokeState::Killing,
                    "Child survived SIGTERM, sending SIGKILL"
                );
                if let Err(e) = runner.kill(pid).await {
                    warn!(invocation_id = %invocation_id, pid = %pid, error = %e, "SIGKILL failed");
                }
            }
        });
    }
}
