//! Fork-based tests for the launcher and controller.

use forkproc_common::{ProcessError, ProcessName};
use forkproc_process::{
    child_exit, launch, Callback, CallbackResult, ExitStatus, Pid, ProcessController, Signal,
    FAILURE_EXIT_CODE,
};
use nix::errno::Errno;
use forkproc_process_state::ProcessState;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Poll `predicate` every 5ms until it returns true or `timeout` expires.
fn wait_until(
    controller: &mut ProcessController,
    predicate: impl Fn(&mut ProcessController) -> bool,
    timeout: Duration,
) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate(controller) {
            return;
        }
        sleep(Duration::from_millis(5));
    }
    panic!(
        "wait_until timed out after {:?}. Final state: {:?}",
        timeout,
        controller.state()
    );
}

/// `kill(pid, 0)`: true while the pid exists, zombies and stopped tasks included.
fn pid_exists(pid: Pid) -> bool {
    match nix::sys::signal::kill(pid, None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

fn spawn(name: &str, callback: Callback) -> ProcessController {
    let name = ProcessName::from(name);
    let pid = launch(&name, &callback).expect("fork failed");
    ProcessController::new(name, pid).unwrap()
}

fn sleep_for(millis: &u64) -> CallbackResult {
    sleep(Duration::from_millis(*millis));
    Ok(0)
}

fn exit_with(code: &u8) -> CallbackResult {
    Ok(*code)
}

fn failing() -> CallbackResult {
    anyhow::bail!("callback failed")
}

fn panicking() -> CallbackResult {
    panic!("callback panicked")
}

fn hard_exit(code: &i32) -> CallbackResult {
    child_exit(*code)
}

#[test]
fn test_exit_code_is_propagated() {
    for code in [0u8, 1, 42, 255] {
        let mut controller = spawn("exit-code", Callback::new(exit_with, code));
        let status = controller.wait().unwrap();
        assert_eq!(status, ExitStatus::Exited(code));
        assert_eq!(controller.exit_code(), Some(code));
        assert_eq!(controller.state(), ProcessState::Terminated);
    }
}

#[test]
fn test_failing_callback_exits_with_failure_code() {
    let mut controller = spawn("failing", Callback::from_fn(failing));
    assert_eq!(controller.wait().unwrap().exit_code(), Some(FAILURE_EXIT_CODE));

    let mut controller = spawn("panicking", Callback::from_fn(panicking));
    assert_eq!(controller.wait().unwrap().exit_code(), Some(FAILURE_EXIT_CODE));
}

#[test]
fn test_child_exit_is_truncated_by_kernel() {
    let mut controller = spawn("truncated", Callback::new(hard_exit, 256));
    assert_eq!(controller.wait().unwrap().exit_code(), Some(0));

    let mut controller = spawn("explicit", Callback::new(hard_exit, 7));
    assert_eq!(controller.wait().unwrap().exit_code(), Some(7));
}

#[test]
fn test_poll_does_not_block_or_reap() {
    let mut controller = spawn("sleeper", Callback::new(sleep_for, 500));
    let started = Instant::now();
    assert!(controller.is_running().unwrap());
    assert!(started.elapsed() < Duration::from_millis(250));
    assert!(!controller.is_reaped());

    controller.wait().unwrap();
    assert!(!controller.is_running().unwrap());
}

#[test]
fn test_wait_is_idempotent() {
    let mut controller = spawn("idempotent", Callback::new(exit_with, 3));
    let first = controller.wait().unwrap();
    let second = controller.wait().unwrap();
    assert_eq!(first, second);
    assert_eq!(controller.state_machine().count_transitions_to(ProcessState::Terminated), 1);
}

#[test]
fn test_stop_resume_and_kill() {
    let mut controller = spawn("stoppable", Callback::new(sleep_for, 100_000));

    controller.stop().unwrap();
    wait_until(&mut controller, |c| c.is_stopped().unwrap(), Duration::from_secs(5));
    assert!(controller.is_signaled().unwrap());
    assert!(controller.is_running().unwrap());
    assert!(pid_exists(controller.pid()));
    assert_eq!(controller.exit_code(), None);

    controller.resume().unwrap();
    assert_eq!(controller.state(), ProcessState::Running);
    assert!(!controller.is_stopped().unwrap());

    controller.kill(Signal::SIGKILL).unwrap();
    let status = controller.wait().unwrap();
    assert!(status.signaled());
    assert_eq!(status.signal_kind(), Some(Signal::SIGKILL));
    assert_eq!(controller.termination_signal(), Some(libc::SIGKILL));
    assert_eq!(controller.exit_code(), None);
    assert_eq!(controller.state(), ProcessState::Signaled);
}

#[test]
fn test_kill_stopped_child() {
    let mut controller = spawn("stopped-then-killed", Callback::new(sleep_for, 100_000));
    controller.stop().unwrap();
    wait_until(&mut controller, |c| c.is_stopped().unwrap(), Duration::from_secs(5));

    controller.force_kill().unwrap();
    let status = controller.wait().unwrap();
    assert_eq!(status.signal_kind(), Some(Signal::SIGKILL));
}

#[test]
fn test_terminate_stopped_child() {
    let mut controller = spawn("stopped-then-terminated", Callback::new(sleep_for, 100_000));
    controller.stop().unwrap();
    wait_until(&mut controller, |c| c.is_stopped().unwrap(), Duration::from_secs(5));

    controller.terminate().unwrap();
    let status = controller.wait().unwrap();
    assert_eq!(status.signal_kind(), Some(Signal::SIGTERM));
    assert_eq!(controller.state(), ProcessState::Signaled);
    assert_eq!(controller.termination_signal(), Some(libc::SIGTERM));
}

#[test]
fn test_catchable_signal_reaches_stopped_child() {
    let mut controller = spawn("stopped-then-hup", Callback::new(sleep_for, 100_000));
    controller.stop().unwrap();
    wait_until(&mut controller, |c| c.is_stopped().unwrap(), Duration::from_secs(5));

    controller.kill(Signal::SIGHUP).unwrap();
    let status = controller.wait().unwrap();
    assert_eq!(status.signal_kind(), Some(Signal::SIGHUP));
    assert_eq!(controller.state(), ProcessState::Signaled);
}

#[test]
fn test_kill_before_stop_is_observed() {
    let mut controller = spawn("unpolled-stop", Callback::new(sleep_for, 100_000));
    controller.stop().unwrap();
    controller.kill(Signal::SIGTERM).unwrap();

    let status = controller.wait().unwrap();
    assert_eq!(status.signal_kind(), Some(Signal::SIGTERM));
    assert_eq!(controller.state(), ProcessState::Signaled);
}

#[test]
fn test_terminate_is_observed_as_sigterm() {
    let mut controller = spawn("terminated", Callback::new(sleep_for, 100_000));
    controller.terminate().unwrap();
    let status = controller.wait().unwrap();
    assert_eq!(status.signal_kind(), Some(Signal::SIGTERM));
    assert!(controller.is_signaled().unwrap());
}

#[test]
fn test_signal_after_reap_fails() {
    let mut controller = spawn("reaped", Callback::new(exit_with, 0));
    controller.wait().unwrap();

    let err = controller.stop().unwrap_err();
    assert!(matches!(err, ProcessError::SignalDelivery { .. }));
    assert!(controller.resume().is_err());
    assert!(controller.kill(Signal::SIGTERM).is_err());
}
