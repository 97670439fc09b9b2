use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use siteagent::errors::AgentError;
use siteagent::exec::{execute, ActivityClock, ExecRequest};
use siteagent_test_utils::{init_tracing, with_timeout};

fn shell(script: &str) -> ExecRequest {
    let mut req = ExecRequest::shell(script);
    req.wait_timeout = Duration::from_secs(10);
    req.drain_timeout = Duration::from_secs(5);
    req
}

#[tokio::test]
async fn round_trip_streams_and_exit_code() {
    init_tracing();

    // Reads exactly 1024 bytes of input, writes fixed strings to both
    // output streams, exits 10.
    let req = shell("head -c 1024 >/dev/null; printf 'out-ok'; printf 'err-ok' >&2; exit 10");
    let input = Cursor::new(vec![b'x'; 1024]);
    let clock = Arc::new(ActivityClock::unbounded());

    let outcome = with_timeout(execute(&req, Some(input), Vec::new(), Vec::new(), clock))
        .await
        .expect("execute failed");

    assert_eq!(outcome.exit_code, 10);
    assert_eq!(outcome.stdout, b"out-ok");
    assert_eq!(outcome.stderr, b"err-ok");
}

#[tokio::test]
async fn input_fully_delivered_before_close() {
    init_tracing();

    // The child's exit code is the number of bytes it read from stdin, so
    // a short write would show up as a wrong code.
    let req = shell("exit $(wc -c)");
    let input = Cursor::new(vec![b'y'; 42]);
    let clock = Arc::new(ActivityClock::unbounded());

    let outcome = with_timeout(execute(&req, Some(input), Vec::new(), Vec::new(), clock))
        .await
        .expect("execute failed");

    assert_eq!(outcome.exit_code, 42);
}

#[tokio::test]
async fn absent_input_does_not_block_output() {
    init_tracing();

    let req = shell("printf 'hello'");
    let clock = Arc::new(ActivityClock::unbounded());

    let outcome = with_timeout(execute(
        &req,
        None::<Cursor<Vec<u8>>>,
        Vec::new(),
        Vec::new(),
        clock,
    ))
    .await
    .expect("execute failed");

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.stdout, b"hello");
    assert!(outcome.stderr.is_empty());
}

#[tokio::test]
async fn launch_failure_surfaces_immediately() {
    init_tracing();

    let req = ExecRequest::new("/definitely/not/a/real/binary");
    let clock = Arc::new(ActivityClock::unbounded());

    let err = with_timeout(execute(
        &req,
        None::<Cursor<Vec<u8>>>,
        Vec::new(),
        Vec::new(),
        clock,
    ))
    .await
    .expect_err("spawn should fail");

    match err {
        AgentError::Launch { program, .. } => {
            assert_eq!(program, "/definitely/not/a/real/binary");
        }
        other => panic!("expected Launch error, got {other:?}"),
    }
}

#[tokio::test]
async fn quiet_input_source_does_not_stall_drain() {
    init_tracing();

    // An input source that stays open but never produces bytes (an
    // interactive stdin) must not hold the drain phase hostage after the
    // child exits: the drain deadline covers only the output relays.
    let (_writer, reader) = tokio::io::duplex(64);
    let mut req = shell("printf hi");
    req.drain_timeout = Duration::from_millis(500);
    let clock = Arc::new(ActivityClock::unbounded());

    let outcome = with_timeout(execute(&req, Some(reader), Vec::new(), Vec::new(), clock))
        .await
        .expect("quiet stdin must not fail a healthy run");

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.stdout, b"hi");
}

#[tokio::test]
async fn nonzero_exit_code_is_reported_not_an_error() {
    init_tracing();

    let req = shell("exit 3");
    let clock = Arc::new(ActivityClock::unbounded());

    let outcome = with_timeout(execute(
        &req,
        None::<Cursor<Vec<u8>>>,
        Vec::new(),
        Vec::new(),
        clock,
    ))
    .await
    .expect("execute failed");

    assert_eq!(outcome.exit_code, 3);
}
