// Tokio process runner
// Real child processes behind the ProcessRunner port

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use coderelay_core::port::process_runner::{
    CommandSpec, PayloadSink, ProcessEvent, ProcessRunner, SpawnedProcess,
};

/// Read size for the stdout/stderr pumps
const PUMP_CHUNK_BYTES: usize = 8 * 1024;

/// Spawns real children via `tokio::process` with fully piped stdio.
///
/// Each spawn gets two pump tasks draining stdout and stderr into the
/// event channel and one waiter task that reaps the child. The waiter
/// joins both pumps before emitting `Exited`, so the exit event is always
/// the last thing a consumer sees.
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

struct StdinSink {
    inner: ChildStdin,
}

#[async_trait]
impl PayloadSink for StdinSink {
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(data).await
    }

    async fn shutdown(&mut self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }
}

fn pump_stdout(
    mut stream: ChildStdout,
    tx: mpsc::UnboundedSender<ProcessEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; PUMP_CHUNK_BYTES];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(ProcessEvent::Stdout(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "stdout pump stopped on read error");
                    break;
                }
            }
        }
    })
}

fn pump_stderr(
    mut stream: ChildStderr,
    tx: mpsc::UnboundedSender<ProcessEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; PUMP_CHUNK_BYTES];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(ProcessEvent::Stderr(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "stderr pump stopped on read error");
                    break;
                }
            }
        }
    })
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn spawn(&self, spec: CommandSpec) -> std::io::Result<SpawnedProcess> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let pid = child.id().map(|id| id as i32);
        info!(program = %spec.program, pid = ?pid, "Spawned child process");

        let stdin: Option<Box<dyn PayloadSink>> = child
            .stdin
            .take()
            .map(|inner| Box::new(StdinSink { inner }) as Box<dyn PayloadSink>);

        let (tx, rx) = mpsc::unbounded_channel();

        let stdout_pump = child.stdout.take().map(|s| pump_stdout(s, tx.clone()));
        let stderr_pump = child.stderr.take().map(|s| pump_stderr(s, tx.clone()));

        // Waiter: reap the child, but only announce the exit after both
        // pumps hit EOF so no output chunk can trail the Exited event.
        tokio::spawn(async move {
            let status = child.wait().await;
            if let Some(pump) = stdout_pump {
                let _ = pump.await;
            }
            if let Some(pump) = stderr_pump {
                let _ = pump.await;
            }
            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(error = %e, "wait() on child failed");
                    None
                }
            };
            let _ = tx.send(ProcessEvent::Exited { code });
        });

        Ok(SpawnedProcess {
            pid,
            stdin,
            events: rx,
        })
    }

    async fn terminate(&self, pid: i32) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            info!(pid = %pid, "Sending SIGTERM");
            kill(Pid::from_raw(pid), Signal::SIGTERM)
                .map_err(|e| std::io::Error::other(format!("SIGTERM failed: {}", e)))
        }

        #[cfg(windows)]
        {
            // No graceful signal on Windows; taskkill without /F asks the
            // process to close.
            info!(pid = %pid, "Requesting termination via taskkill");
            let output = std::process::Command::new("taskkill")
                .args(["/PID", &pid.to_string()])
                .output()?;
            if output.status.success() {
                Ok(())
            } else {
                Err(std::io::Error::other(format!(
                    "taskkill failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                )))
            }
        }
    }

    async fn kill(&self, pid: i32) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            warn!(pid = %pid, "Sending SIGKILL");
            kill(Pid::from_raw(pid), Signal::SIGKILL)
                .map_err(|e| std::io::Error::other(format!("SIGKILL failed: {}", e)))
        }

        #[cfg(windows)]
        {
            warn!(pid = %pid, "Force-killing via taskkill /F");
            let output = std::process::Command::new("taskkill")
                .args(["/F", "/PID", &pid.to_string()])
                .output()?;
            if output.status.success() {
                Ok(())
            } else {
                Err(std::io::Error::other(format!(
                    "taskkill failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                )))
            }
        }
    }

    fn is_alive(&self, pid: i32) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            // Signal 0 checks if process exists without actually sending a signal
            kill(Pid::from_raw(pid), Signal::try_from(0).ok()).is_ok()
        }

        #[cfg(windows)]
        {
            let output = std::process::Command::new("tasklist")
                .args(["/FI", &format!("PID eq {}", pid), "/NH"])
                .output();

            if let Ok(output) = output {
                let output_str = String::from_utf8_lossy(&output.stdout);
                output_str.contains(&pid.to_string())
            } else {
                false
            }
        }
    }
}
