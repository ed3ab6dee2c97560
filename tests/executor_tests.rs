// tests/executor_tests.rs

use std::time::{Duration, Instant};

use workhorse::config::{EnvMode, ServerConfig};
use workhorse::errors::WorkerError;
use workhorse::exec::{
    EXIT_INVALID_COMMAND, EXIT_SPAWN_FAILURE, EXIT_TIMEOUT, Executor, SIGNAL_EXIT_BASE,
};
use workhorse::protocol::{EnvEntry, ExecuteCommand};

fn executor() -> Executor {
    Executor::new(ServerConfig::default())
}

fn executor_with(modify: impl FnOnce(&mut ServerConfig)) -> Executor {
    let mut cfg = ServerConfig::default();
    modify(&mut cfg);
    Executor::new(cfg)
}

fn sh(script: &str) -> ExecuteCommand {
    ExecuteCommand::from_args(["/bin/sh", "-c", script])
}

#[tokio::test]
async fn test_echo_hello_succeeds_with_empty_stderr() {
    let resp = executor().execute(&ExecuteCommand::from_args(["echo", "hello"])).await;
    assert_eq!(resp.exit_code, 0);
    assert_eq!(resp.stderr, "");
}

#[tokio::test]
async fn test_child_exit_code_passed_through() {
    let resp = executor().execute(&sh("exit 42")).await;
    assert_eq!(resp.exit_code, 42);
}

#[tokio::test]
async fn test_stderr_captured_stdout_discarded() {
    let resp = executor().execute(&sh("echo to-stdout; echo to-stderr >&2")).await;
    assert_eq!(resp.exit_code, 0);
    assert_eq!(resp.stderr, "to-stderr\n");
}

#[tokio::test]
async fn test_empty_argv_rejected_before_spawn() {
    let cmd = ExecuteCommand::new(vec![], vec![]);

    let err = executor().try_execute(&cmd).await.unwrap_err();
    assert!(matches!(err, WorkerError::InvalidCommand(_)));

    let resp = executor().execute(&cmd).await;
    assert_eq!(resp.exit_code, EXIT_INVALID_COMMAND);
    assert!(resp.stderr.contains("invalid command"));
}

#[tokio::test]
async fn test_unresolvable_program_yields_spawn_sentinel() {
    let cmd = ExecuteCommand::from_args(["/definitely/not/a/real/binary"]);
    let resp = executor().execute(&cmd).await;
    assert_eq!(resp.exit_code, EXIT_SPAWN_FAILURE);
    assert!(resp.stderr.contains("spawn failed"));
}

#[tokio::test]
async fn test_env_overlay_reaches_child() {
    let mut cmd = sh(r#"printf "%s" "$WORKHORSE_TEST_VAR" >&2"#);
    cmd.env.push(EnvEntry {
        key: b"WORKHORSE_TEST_VAR".to_vec(),
        value: b"overlay-value".to_vec(),
    });

    let resp = executor().execute(&cmd).await;
    assert_eq!(resp.exit_code, 0);
    assert_eq!(resp.stderr, "overlay-value");
}

#[tokio::test]
async fn test_duplicate_env_keys_last_write_wins() {
    let mut cmd = sh(r#"printf "%s" "$DUP" >&2"#);
    cmd.env.push(EnvEntry { key: b"DUP".to_vec(), value: b"first".to_vec() });
    cmd.env.push(EnvEntry { key: b"DUP".to_vec(), value: b"second".to_vec() });

    let resp = executor().execute(&cmd).await;
    assert_eq!(resp.stderr, "second");
}

#[tokio::test]
async fn test_env_clear_mode_drops_inherited_environment() {
    let exec = executor_with(|cfg| cfg.env_mode = EnvMode::Clear);

    // PATH is inherited from the server in overlay mode but must be gone
    // under clear mode; the request's own entries still arrive.
    let mut cmd = sh(r#"printf "%s:%s" "${PATH:-nopath}" "$K" >&2"#);
    cmd.env.push(EnvEntry { key: b"K".to_vec(), value: b"kept".to_vec() });

    let resp = exec.execute(&cmd).await;
    assert_eq!(resp.exit_code, 0);
    assert_eq!(resp.stderr, "nopath:kept");
}

#[tokio::test]
async fn test_signal_termination_maps_to_128_plus_signal() {
    let resp = executor().execute(&sh("kill -TERM $$")).await;
    // SIGTERM is 15
    assert_eq!(resp.exit_code, SIGNAL_EXIT_BASE + 15);
}

#[tokio::test]
async fn test_timeout_kills_child_within_grace_period() {
    let exec = executor_with(|cfg| cfg.exec_timeout = Some(Duration::from_secs(1)));

    let start = Instant::now();
    let resp = exec.execute(&sh("sleep 30")).await;
    let elapsed = start.elapsed();

    assert_eq!(resp.exit_code, EXIT_TIMEOUT);
    assert!(resp.stderr.contains("timed out"));
    assert!(elapsed < Duration::from_secs(5), "kill took {elapsed:?}");
}

#[tokio::test]
async fn test_large_stderr_fully_captured_without_deadlock() {
    // The child floods both pipes at once; both must drain concurrently
    // or the child blocks on a full buffer and never exits.
    let script = "yes out | head -c 1000000 & yes err | head -c 8000000 >&2; wait";
    let resp = executor().execute(&sh(script)).await;

    assert_eq!(resp.exit_code, 0);
    assert_eq!(resp.stderr.len(), 8_000_000);
    assert!(!resp.stderr.contains("truncated"));
}

#[tokio::test]
async fn test_stderr_cap_appends_truncation_marker() {
    let exec = executor_with(|cfg| cfg.max_stderr_bytes = 1024);

    let resp = exec.execute(&sh("yes err | head -c 100000 >&2")).await;
    assert_eq!(resp.exit_code, 0);
    assert!(resp.stderr.contains("workhorse: stderr truncated"));
    // Capture itself stays at the cap; only the marker is appended.
    assert!(resp.stderr.len() < 1024 + 128);
}

#[tokio::test]
async fn test_non_utf8_stderr_is_lossily_decoded() {
    let resp = executor().execute(&sh(r"printf '\377\376ok' >&2")).await;
    assert_eq!(resp.exit_code, 0);
    assert!(resp.stderr.contains('\u{fffd}'));
    assert!(resp.stderr.ends_with("ok"));
}
