//! Unit tests for the invoker resolution paths.
//!
//! Everything here is deterministic: time is a ManualClock advanced by the
//! test, children are scripted MockProcessRunner plans. No real processes,
//! no real sleeps.

use super::*;
use crate::domain::{EffortLevel, InvocationRequest};
use crate::port::clock::mocks::ManualClock;
use crate::port::process_runner::mocks::{MockProcessRunner, ProcessPlan, SentSignal, StdinMode};
use crate::port::process_runner::ProcessEvent;
use std::sync::Arc;

struct Harness {
    invoker: Arc<ProcessInvoker>,
    clock: Arc<ManualClock>,
    runner: Arc<MockProcessRunner>,
}

fn harness(config: InvokerConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(0));
    let runner = Arc::new(MockProcessRunner::new());
    let invoker = Arc::new(ProcessInvoker::new(config, clock.clone(), runner.clone()));
    Harness {
        invoker,
        clock,
        runner,
    }
}

fn test_config() -> InvokerConfig {
    InvokerConfig {
        api_key: Some("sk-test".to_string()),
        ..InvokerConfig::default()
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    while !condition() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_payload_never_reaches_argv() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::exits(0, "done", ""));

    let payload = "--full-auto -m evil ; rm -rf /\nsecond line of prompt";
    let request = InvocationRequest::new(payload, "gpt-5-codex");
    h.invoker.invoke(request).await.unwrap();

    let specs = h.runner.specs();
    assert_eq!(specs.len(), 1);
    let spec = &specs[0];
    assert_eq!(spec.program, "codex");
    assert_eq!(
        spec.args,
        vec![
            "exec",
            "--full-auto",
            "-m",
            "gpt-5-codex",
            "-c",
            "model_reasoning_effort=high"
        ]
    );
    assert!(!spec.args.iter().any(|arg| arg.contains(payload)));

    // The payload travelled over stdin instead, in full, and the stream
    // was closed to signal end-of-input
    assert_eq!(h.runner.written(), payload.as_bytes());
    assert_eq!(h.runner.shutdown_count(), 1);
}

#[tokio::test]
async fn test_command_carries_effort_and_credential() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::exits(0, "", ""));

    let request = InvocationRequest::new("p", "o3").with_effort(EffortLevel::Low);
    let _ = h.invoker.invoke(request).await;

    let spec = &h.runner.specs()[0];
    assert!(spec
        .args
        .contains(&"model_reasoning_effort=low".to_string()));
    assert_eq!(
        spec.env,
        vec![("OPENAI_API_KEY".to_string(), "sk-test".to_string())]
    );
}

#[tokio::test]
async fn test_no_credential_leaves_env_untouched() {
    let h = harness(InvokerConfig::default());
    assert!(!h.invoker.credential_present());

    h.runner.plan(ProcessPlan::exits(0, "", ""));
    let _ = h.invoker.invoke(InvocationRequest::new("p", "m")).await;
    assert!(h.runner.specs()[0].env.is_empty());
}

#[tokio::test]
async fn test_natural_success_round_trip() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::exits(0, "ok", ""));

    let output = h
        .invoker
        .invoke(InvocationRequest::new("ping", "gpt-5-codex"))
        .await
        .unwrap();

    assert_eq!(output.stdout, "ok");
    assert!(h.runner.signals().is_empty());
}

#[tokio::test]
async fn test_success_keeps_diagnostics_out_of_the_result() {
    let h = harness(test_config());
    h.runner
        .plan(ProcessPlan::exits(0, "result text", "warning: deprecated flag"));

    let output = h
        .invoker
        .invoke(InvocationRequest::new("p", "m"))
        .await
        .unwrap();
    assert_eq!(output.stdout, "result text");
}

#[tokio::test]
async fn test_empty_payload_is_a_valid_request() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::exits(0, "", ""));

    let output = h
        .invoker
        .invoke(InvocationRequest::new("", "m"))
        .await
        .unwrap();

    assert_eq!(output.stdout, "");
    assert!(h.runner.written().is_empty());
    assert_eq!(h.runner.shutdown_count(), 1);
}

#[tokio::test]
async fn test_non_zero_exit_carries_code_and_diagnostics() {
    let h = harness(test_config());
    h.runner
        .plan(ProcessPlan::exits(2, "partial stdout", "bad input"));

    let err = h
        .invoker
        .invoke(InvocationRequest::new("p", "m"))
        .await
        .unwrap_err();

    match &err {
        InvokeError::NonZeroExit { code, stderr } => {
            assert_eq!(*code, 2);
            assert_eq!(stderr, "bad input");
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("2"));
    assert!(message.contains("bad input"));
}

#[tokio::test]
async fn test_signal_death_maps_to_sentinel_code() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan {
        pid: Some(4242),
        stdin: StdinMode::Normal,
        events: vec![ProcessEvent::Exited { code: None }],
        hold_open: false,
        spawn_error: None,
    });

    let err = h
        .invoker
        .invoke(InvocationRequest::new("p", "m"))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::NonZeroExit { code: -1, .. }));
}

#[tokio::test]
async fn test_spawn_failure_is_typed() {
    let h = harness(test_config());
    h.runner
        .plan(ProcessPlan::spawn_fails("No such file or directory"));

    let err = h
        .invoker
        .invoke(InvocationRequest::new("p", "m"))
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::SpawnFailed(_)));
    assert!(err.to_string().contains("No such file or directory"));
}

#[tokio::test]
async fn test_missing_stdin_resolves_and_reaps() {
    let h = harness(test_config());
    h.runner.plan(
        ProcessPlan::hangs()
            .with_stdin(StdinMode::Absent)
            .with_pid(7),
    );

    let err = h
        .invoker
        .invoke(InvocationRequest::new("p", "m"))
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::StreamUnavailable));
    // The fast path still reaps the child
    assert_eq!(h.runner.signals(), vec![SentSignal::Kill(7)]);
    assert!(h.runner.written().is_empty());
}

#[tokio::test]
async fn test_stdin_write_failure_resolves_and_host_survives() {
    let h = harness(test_config());
    h.runner
        .plan(ProcessPlan::hangs().with_stdin(StdinMode::FailWrite));

    let err = h
        .invoker
        .invoke(InvocationRequest::new("payload", "m"))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::StdinWriteFailed(_)));
    assert!(err.to_string().contains("broken pipe"));

    // Same invoker keeps serving further invocations
    h.runner.plan(ProcessPlan::exits(0, "still alive", ""));
    let output = h
        .invoker
        .invoke(InvocationRequest::new("again", "m"))
        .await
        .unwrap();
    assert_eq!(output.stdout, "still alive");
}

#[tokio::test]
async fn test_stdin_close_failure_is_write_failed() {
    let h = harness(test_config());
    h.runner
        .plan(ProcessPlan::hangs().with_stdin(StdinMode::FailShutdown));

    let err = h
        .invoker
        .invoke(InvocationRequest::new("p", "m"))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::StdinWriteFailed(_)));
}

#[tokio::test]
async fn test_timeout_resolves_at_budget_and_kills_after_grace() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::hangs().with_pid(99));

    let handle = {
        let invoker = h.invoker.clone();
        tokio::spawn(async move {
            invoker
                .invoke(InvocationRequest::new("p", "m").with_timeout_override(10_000))
                .await
        })
    };
    wait_for(|| h.clock.sleeper_count() > 0).await;

    // One tick before the budget: still running, no signals sent
    h.clock.advance(9_999);
    tokio::task::yield_now().await;
    assert!(!handle.is_finished());
    assert!(h.runner.signals().is_empty());

    // The budget elapses: SIGTERM goes out and the caller resolves
    // immediately, without waiting for the child to die
    h.clock.advance(1);
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, InvokeError::Timeout(10_000)));
    assert_eq!(err.to_string(), "timed out after 10000 ms");
    assert_eq!(h.runner.signals(), vec![SentSignal::Term(99)]);

    // The escalation timer keeps running past resolution; at the grace
    // deadline a still-alive child gets SIGKILL
    wait_for(|| h.clock.sleeper_count() > 0).await;
    h.clock.advance(KILL_GRACE_MS as i64);
    wait_for(|| h.runner.signals().len() == 2).await;
    assert_eq!(
        h.runner.signals(),
        vec![SentSignal::Term(99), SentSignal::Kill(99)]
    );
}

#[tokio::test]
async fn test_escalation_skips_kill_when_child_dies_in_grace() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::hangs().with_pid(41));

    let handle = {
        let invoker = h.invoker.clone();
        tokio::spawn(async move {
            invoker
                .invoke(InvocationRequest::new("p", "m").with_timeout_override(500))
                .await
        })
    };
    wait_for(|| h.clock.sleeper_count() > 0).await;

    h.clock.advance(500);
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, InvokeError::Timeout(500)));

    // The graceful signal worked this time
    wait_for(|| h.clock.sleeper_count() > 0).await;
    h.runner.set_alive(false);
    h.clock.advance(KILL_GRACE_MS as i64);
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.runner.signals(), vec![SentSignal::Term(41)]);
}

#[tokio::test]
async fn test_default_budget_applies_without_override() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::hangs());

    let handle = {
        let invoker = h.invoker.clone();
        tokio::spawn(async move { invoker.invoke(InvocationRequest::new("p", "m")).await })
    };
    wait_for(|| h.clock.sleeper_count() > 0).await;

    h.clock.advance(DEFAULT_TIMEOUT_MS - 1);
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!handle.is_finished());

    h.clock.advance(1);
    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "timed out after 300000 ms");
}

#[tokio::test]
async fn test_late_events_after_resolution_are_inert() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::hangs().with_pid(13));

    let handle = {
        let invoker = h.invoker.clone();
        tokio::spawn(async move {
            invoker
                .invoke(InvocationRequest::new("p", "m").with_timeout_override(1_000))
                .await
        })
    };
    wait_for(|| h.clock.sleeper_count() > 0).await;

    h.clock.advance(1_000);
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, InvokeError::Timeout(_)));

    // The event channel died with the invocation: late stream data and a
    // late exit have nowhere to land
    assert!(!h
        .runner
        .push_event(0, ProcessEvent::Stdout(b"late".to_vec())));
    assert!(!h.runner.push_event(0, ProcessEvent::Exited { code: Some(0) }));
}

#[tokio::test]
async fn test_concurrent_invocations_share_nothing() {
    let h = harness(test_config());

    h.runner.plan(ProcessPlan::hangs().with_pid(1));
    let first = {
        let invoker = h.invoker.clone();
        tokio::spawn(async move {
            invoker
                .invoke(InvocationRequest::new("first payload", "m").with_timeout_override(60_000))
                .await
        })
    };
    wait_for(|| !h.runner.specs().is_empty()).await;

    h.runner.plan(ProcessPlan::hangs().with_pid(2));
    let second = {
        let invoker = h.invoker.clone();
        tokio::spawn(async move {
            invoker
                .invoke(InvocationRequest::new("second payload", "m").with_timeout_override(90_000))
                .await
        })
    };
    wait_for(|| h.runner.specs().len() == 2).await;

    assert!(h
        .runner
        .push_event(0, ProcessEvent::Stdout(b"from first".to_vec())));
    assert!(h
        .runner
        .push_event(1, ProcessEvent::Stdout(b"from second".to_vec())));

    // Second resolves while first stays in flight
    assert!(h.runner.push_event(1, ProcessEvent::Exited { code: Some(0) }));
    let second_out = second.await.unwrap().unwrap();
    assert_eq!(second_out.stdout, "from second");
    assert!(!first.is_finished());

    assert!(h.runner.push_event(0, ProcessEvent::Exited { code: Some(0) }));
    let first_out = first.await.unwrap().unwrap();
    assert_eq!(first_out.stdout, "from first");
}

#[tokio::test]
async fn test_duration_measured_with_injected_clock() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::hangs());

    let handle = {
        let invoker = h.invoker.clone();
        tokio::spawn(async move { invoker.invoke(InvocationRequest::new("p", "m")).await })
    };
    wait_for(|| h.clock.sleeper_count() > 0).await;

    h.clock.advance(120);
    assert!(h.runner.push_event(0, ProcessEvent::Exited { code: Some(0) }));
    let output = handle.await.unwrap().unwrap();
    assert_eq!(output.duration_ms, 120);
}

#[tokio::test]
async fn test_event_stream_vanishing_is_a_spawn_failure() {
    let h = harness(test_config());
    h.runner.plan(ProcessPlan::hangs());

    let handle = {
        let invoker = h.invoker.clone();
        tokio::spawn(async move { invoker.invoke(InvocationRequest::new("p", "m")).await })
    };
    wait_for(|| !h.runner.specs().is_empty()).await;

    h.runner.close_events(0);
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, InvokeError::SpawnFailed(_)));
    assert!(err.to_string().contains("closed before exit"));
}
