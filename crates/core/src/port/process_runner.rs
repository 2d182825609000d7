// Process Runner Port
// Abstraction over spawning and signalling OS processes

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Fully resolved command line plus environment overlay for a child.
///
/// `args` carries flags and option values only. The payload travels through
/// the stdin sink and must never be placed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables layered over the inherited environment
    pub env: Vec<(String, String)>,
}

/// One event from a running child.
///
/// Chunks arrive in read order per stream; `Exited` is always the final
/// event and is sent only after both output streams reached EOF.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exited { code: Option<i32> },
}

/// Write half of the child's stdin
#[async_trait]
pub trait PayloadSink: Send {
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Flush and close the stream so the child sees EOF
    async fn shutdown(&mut self) -> std::io::Result<()>;
}

/// A spawned child process, as seen by the application layer
pub struct SpawnedProcess {
    /// OS process id, when the platform reports one
    pub pid: Option<i32>,
    /// Stdin write half; `None` when the pipe could not be acquired
    pub stdin: Option<Box<dyn PayloadSink>>,
    /// Merged stdout/stderr/exit event stream
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

/// Process Runner trait
///
/// Implementations:
/// - TokioProcessRunner: real child processes (infra-process crate)
/// - mocks::MockProcessRunner: scripted children for tests
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Spawn a child with piped stdio
    ///
    /// # Errors
    /// Returns the OS error when the process cannot be started (binary
    /// missing, permission denied, resource limits).
    async fn spawn(&self, spec: CommandSpec) -> std::io::Result<SpawnedProcess>;

    /// Ask the process to exit (SIGTERM on unix)
    async fn terminate(&self, pid: i32) -> std::io::Result<()>;

    /// Force-kill the process (SIGKILL on unix)
    async fn kill(&self, pid: i32) -> std::io::Result<()>;

    /// Whether the process still exists
    fn is_alive(&self, pid: i32) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// How a scripted child's stdin behaves
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum StdinMode {
        /// Accept writes and close normally
        Normal,
        /// No stdin handle at all
        Absent,
        /// First write fails with a broken pipe
        FailWrite,
        /// Writes succeed, closing the stream fails
        FailShutdown,
    }

    /// Script for one spawned child
    pub struct ProcessPlan {
        pub pid: Option<i32>,
        pub stdin: StdinMode,
        /// Events delivered immediately after spawn, in order
        pub events: Vec<ProcessEvent>,
        /// Keep the event channel open after the scripted events: the child
        /// "keeps running" until `push_event`/`close_events` say otherwise
        pub hold_open: bool,
        /// Fail the spawn itself instead of producing a child
        pub spawn_error: Option<String>,
    }

    impl ProcessPlan {
        /// Child that emits the given output, then exits with `code`
        pub fn exits(code: i32, stdout: &str, stderr: &str) -> Self {
            let mut events = Vec::new();
            if !stdout.is_empty() {
                events.push(ProcessEvent::Stdout(stdout.as_bytes().to_vec()));
            }
            if !stderr.is_empty() {
                events.push(ProcessEvent::Stderr(stderr.as_bytes().to_vec()));
            }
            events.push(ProcessEvent::Exited { code: Some(code) });
            Self {
                pid: Some(4242),
                stdin: StdinMode::Normal,
                events,
                hold_open: false,
                spawn_error: None,
            }
        }

        /// Child that never exits on its own
        pub fn hangs() -> Self {
            Self {
                pid: Some(4242),
                stdin: StdinMode::Normal,
                events: Vec::new(),
                hold_open: true,
                spawn_error: None,
            }
        }

        pub fn spawn_fails(message: impl Into<String>) -> Self {
            Self {
                pid: None,
                stdin: StdinMode::Absent,
                events: Vec::new(),
                hold_open: false,
                spawn_error: Some(message.into()),
            }
        }

        pub fn with_pid(mut self, pid: i32) -> Self {
            self.pid = Some(pid);
            self
        }

        pub fn with_stdin(mut self, mode: StdinMode) -> Self {
            self.stdin = mode;
            self
        }

        /// Append a scripted event before the channel settles
        pub fn with_event(mut self, event: ProcessEvent) -> Self {
            self.events.push(event);
            self
        }
    }

    /// Signal recorded by the mock runner
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SentSignal {
        Term(i32),
        Kill(i32),
    }

    #[derive(Default)]
    struct MockState {
        plans: VecDeque<ProcessPlan>,
        specs: Vec<CommandSpec>,
        signals: Vec<SentSignal>,
        writes: Vec<Vec<u8>>,
        shutdowns: usize,
        /// One slot per spawn; `Some` only for hold_open children
        senders: Vec<Option<mpsc::UnboundedSender<ProcessEvent>>>,
    }

    /// Mock Process Runner for testing
    pub struct MockProcessRunner {
        state: Arc<Mutex<MockState>>,
        alive: AtomicBool,
    }

    impl MockProcessRunner {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(MockState::default())),
                alive: AtomicBool::new(true),
            }
        }

        /// Queue the script for the next spawn
        pub fn plan(&self, plan: ProcessPlan) {
            self.state.lock().unwrap().plans.push_back(plan);
        }

        /// Control what `is_alive` reports
        pub fn set_alive(&self, alive: bool) {
            self.alive.store(alive, Ordering::SeqCst);
        }

        /// Command specs captured from every spawn, in order
        pub fn specs(&self) -> Vec<CommandSpec> {
            self.state.lock().unwrap().specs.clone()
        }

        /// Signals sent so far, in order
        pub fn signals(&self) -> Vec<SentSignal> {
            self.state.lock().unwrap().signals.clone()
        }

        /// Everything written to any child's stdin, concatenated
        pub fn written(&self) -> Vec<u8> {
            let state = self.state.lock().unwrap();
            state.writes.iter().flatten().copied().collect()
        }

        /// How many stdin streams were shut down cleanly
        pub fn shutdown_count(&self) -> usize {
            self.state.lock().unwrap().shutdowns
        }

        /// Emit a late event on the `index`-th spawned child (hold_open
        /// only). Returns false when the receiver is gone or the channel
        /// was closed.
        pub fn push_event(&self, index: usize, event: ProcessEvent) -> bool {
            let state = self.state.lock().unwrap();
            match state.senders.get(index) {
                Some(Some(tx)) => tx.send(event).is_ok(),
                _ => false,
            }
        }

        /// Close the `index`-th child's event channel without an Exited
        /// event (simulates a broken launch infrastructure)
        pub fn close_events(&self, index: usize) {
            let mut state = self.state.lock().unwrap();
            if let Some(slot) = state.senders.get_mut(index) {
                *slot = None;
            }
        }
    }

    impl Default for MockProcessRunner {
        fn default() -> Self {
            Self::new()
        }
    }

    struct MockPayloadSink {
        mode: StdinMode,
        state: Arc<Mutex<MockState>>,
    }

    #[async_trait]
    impl PayloadSink for MockPayloadSink {
        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            if self.mode == StdinMode::FailWrite {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            self.state.lock().unwrap().writes.push(data.to_vec());
            Ok(())
        }

        async fn shutdown(&mut self) -> io::Result<()> {
            if self.mode == StdinMode::FailShutdown {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
            }
            self.state.lock().unwrap().shutdowns += 1;
            Ok(())
        }
    }

    #[async_trait]
    impl ProcessRunner for MockProcessRunner {
        async fn spawn(&self, spec: CommandSpec) -> io::Result<SpawnedProcess> {
            let plan = {
                let mut state = self.state.lock().unwrap();
                state.specs.push(spec);
                state.plans.pop_front()
            };
            let plan = match plan {
                Some(plan) => plan,
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        "no scripted process plan",
                    ))
                }
            };
            if let Some(message) = plan.spawn_error {
                return Err(io::Error::new(io::ErrorKind::NotFound, message));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            for event in plan.events {
                let _ = tx.send(event);
            }
            self.state
                .lock()
                .unwrap()
                .senders
                .push(if plan.hold_open { Some(tx) } else { None });

            let stdin: Option<Box<dyn PayloadSink>> = match plan.stdin {
                StdinMode::Absent => None,
                mode => Some(Box::new(MockPayloadSink {
                    mode,
                    state: self.state.clone(),
                })),
            };

            Ok(SpawnedProcess {
                pid: plan.pid,
                stdin,
                events: rx,
            })
        }

        async fn terminate(&self, pid: i32) -> io::Result<()> {
            self.state.lock().unwrap().signals.push(SentSignal::Term(pid));
            Ok(())
        }

        async fn kill(&self, pid: i32) -> io::Result<()> {
            self.state.lock().unwrap().signals.push(SentSignal::Kill(pid));
            Ok(())
        }

        fn is_alive(&self, _pid: i32) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }
}
