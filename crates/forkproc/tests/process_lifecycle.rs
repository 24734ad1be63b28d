//! End-to-end lifecycle tests through the `Process` façade.

use forkproc::logging::init_logging;
use forkproc::{
    child_exit, Callback, CallbackResult, Process, ProcessError, ProcessState, Signal,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::Level;

/// Poll `predicate` every 5ms until it returns true or `timeout` expires.
fn wait_until(
    process: &mut Process,
    predicate: impl Fn(&mut Process) -> bool,
    timeout: Duration,
) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate(process) {
            return;
        }
        sleep(Duration::from_millis(5));
    }
    panic!(
        "wait_until timed out after {:?}. Final state: {:?}",
        timeout,
        process.state()
    );
}

fn sleep_for(duration: &Duration) -> CallbackResult {
    sleep(*duration);
    Ok(0)
}

fn exit_255() -> CallbackResult {
    child_exit(255)
}

fn exit_with(code: &u8) -> CallbackResult {
    Ok(*code)
}

#[test]
fn test_start_then_wait() {
    init_logging(true);
    let mut process = Process::named("sleep-1s", Callback::new(sleep_for, Duration::from_secs(1)));
    assert!(!process.is_running().unwrap());

    process.start().unwrap();
    assert!(process.is_running().unwrap());

    process.wait().unwrap();
    assert!(!process.is_running().unwrap());
    assert_eq!(process.state(), ProcessState::Terminated);
}

#[test]
fn test_run_reports_exit_255() {
    let mut process = Process::named("exit-255", Callback::from_fn(exit_255));
    let status = process.run().unwrap();
    assert_eq!(status.exit_code(), Some(255));
    assert_eq!(process.exit_code(), Some(255));
}

#[test]
fn test_stop_is_a_signal() {
    let mut process =
        Process::named("sleep-100s", Callback::new(sleep_for, Duration::from_secs(100)));
    process.start().unwrap();
    process.stop().unwrap();

    wait_until(&mut process, |p| p.is_stopped().unwrap(), Duration::from_secs(5));
    assert!(process.is_signaled().unwrap());
    assert!(process.is_stopped().unwrap());
    assert!(process.is_running().unwrap());
    assert_eq!(process.exit_code(), None);

    process.kill(Signal::SIGKILL).unwrap();
    let status = process.wait().unwrap().unwrap();
    assert_eq!(status.signal_kind(), Some(Signal::SIGKILL));
    assert_eq!(process.termination_signal(), Some(Signal::SIGKILL as i32));
    assert_eq!(process.exit_code(), None);
    assert!(!process.is_running().unwrap());
}

#[test]
fn test_trivial_work_exits_zero() {
    let mut process =
        Process::named("usleep", Callback::new(sleep_for, Duration::from_micros(100)));
    process.start().unwrap();
    process.wait().unwrap();
    assert_eq!(process.exit_code(), Some(0));
}

#[test]
fn test_pid_is_set_only_after_start() {
    let mut process = Process::new(Callback::new(sleep_for, Duration::from_millis(200)));
    assert_eq!(process.pid(), None);

    let pid = process.start().unwrap();
    assert!(pid.as_raw() > 0);
    assert_eq!(process.pid(), Some(pid));

    process.wait().unwrap();
    assert_eq!(process.pid(), Some(pid));
}

#[test]
fn test_exit_code_fidelity() {
    for code in [0u8, 1, 2, 127, 128, 254, 255] {
        let mut process = Process::named("exit-code", Callback::new(exit_with, code));
        process.run().unwrap();
        assert_eq!(process.exit_code(), Some(code));
    }
}

#[test]
fn test_wait_twice_returns_same_result() {
    let mut process = Process::new(Callback::new(exit_with, 9));
    process.start().unwrap();
    let first = process.wait().unwrap();
    let second = process.wait().unwrap();
    assert_eq!(first, second);
    assert_eq!(process.exit_code(), Some(9));
}

#[test]
fn test_run_blocks_for_callback_runtime() {
    let runtime = Duration::from_millis(300);
    let mut process = Process::new(Callback::new(sleep_for, runtime));
    let started = Instant::now();
    process.run().unwrap();
    assert!(started.elapsed() >= runtime);
}

#[test]
fn test_second_start_fails_loudly() {
    let mut process = Process::new(Callback::new(exit_with, 0));
    let pid = process.start().unwrap();

    let err = process.start().unwrap_err();
    assert!(matches!(err, ProcessError::InvalidState { .. }));
    assert!(matches!(
        process.run().unwrap_err(),
        ProcessError::InvalidState { .. }
    ));
    assert_eq!(process.pid(), Some(pid));

    process.wait().unwrap();
    assert!(process.start().is_err());
}

#[test]
fn test_resume_after_stop() {
    let mut process = Process::new(Callback::new(sleep_for, Duration::from_millis(300)));
    process.start().unwrap();
    process.stop().unwrap();
    wait_until(&mut process, |p| p.is_stopped().unwrap(), Duration::from_secs(5));

    process.resume().unwrap();
    assert_eq!(process.state(), ProcessState::Running);
    assert!(!process.is_signaled().unwrap());

    let status = process.wait().unwrap().unwrap();
    assert!(status.success());
}

#[test]
fn test_terminate_and_signal_after_reap() {
    let mut process = Process::new(Callback::new(sleep_for, Duration::from_secs(100)));
    process.start().unwrap();
    process.terminate().unwrap();

    let status = process.wait().unwrap().unwrap();
    assert_eq!(status.signal_kind(), Some(Signal::SIGTERM));
    assert!(process.is_signaled().unwrap());
    assert!(!process.is_stopped().unwrap());

    assert!(matches!(
        process.stop().unwrap_err(),
        ProcessError::SignalDelivery { .. }
    ));
}

#[test]
fn test_terminate_after_stop() {
    let mut process =
        Process::named("stopped-sleeper", Callback::new(sleep_for, Duration::from_secs(100)));
    process.start().unwrap();
    process.stop().unwrap();
    wait_until(&mut process, |p| p.is_stopped().unwrap(), Duration::from_secs(5));

    process.terminate().unwrap();
    let status = process.wait().unwrap().unwrap();
    assert_eq!(status.signal_kind(), Some(Signal::SIGTERM));
    assert_eq!(process.state(), ProcessState::Signaled);
    assert!(!process.is_running().unwrap());
}

fn report_tracing_enabled() -> CallbackResult {
    Ok(u8::from(tracing::enabled!(Level::ERROR)))
}

#[test]
fn test_child_discards_tracing_events() {
    init_logging(false);
    assert!(tracing::enabled!(Level::ERROR));

    let mut process = Process::named("quiet-child", Callback::from_fn(report_tracing_enabled));
    assert_eq!(process.run().unwrap().exit_code(), Some(0));
}

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn bump_counter() -> CallbackResult {
    let after = COUNTER.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(after as u8)
}

#[test]
fn test_child_writes_are_invisible_to_parent() {
    let before = COUNTER.load(Ordering::SeqCst);
    let mut process = Process::new(Callback::from_fn(bump_counter));
    let status = process.run().unwrap();
    assert_eq!(status.exit_code(), Some((before + 1) as u8));
    assert_eq!(COUNTER.load(Ordering::SeqCst), before);
}
