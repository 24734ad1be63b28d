//! Observe and control one launched child by pid.
//!
//! The controller owns the only reaper for its pid. State is re-derived from
//! `waitpid` on every query until a terminal status has been latched; after
//! that the pid is never passed to the kernel again, since it may already
//! belong to an unrelated process.

use crate::exit_status::{decode_wait_status, ExitStatus};
use crate::signal::send_signal;
use crate::wait::{poll_flags, wait_raw};
use forkproc_common::{ProcessError, ProcessName, ProcessResult};
use forkproc_process_state::{ProcessState, ProcessStateMachine};
use nix::sys::signal::Signal;
use nix::sys::wait::WaitPidFlag;
use nix::unistd::Pid;
use tracing::{debug, error, info};

#[derive(Debug)]
pub struct ProcessController {
    name: ProcessName,
    pid: Pid,
    state: ProcessStateMachine,
    /// Latched once the child has been reaped.
    result: Option<ExitStatus>,
}

impl ProcessController {
    /// Take control of a freshly launched child.
    pub fn new(name: ProcessName, pid: Pid) -> ProcessResult<Self> {
        let mut state = ProcessStateMachine::new(name.as_str());
        state.transition_to_running("forked")?;
        Ok(Self {
            name,
            pid,
            state,
            result: None,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &ProcessName {
        &self.name
    }

    /// Last observed state, without querying the kernel.
    pub fn state(&self) -> ProcessState {
        self.state.current_state()
    }

    pub fn state_machine(&self) -> &ProcessStateMachine {
        &self.state
    }

    /// Non-blocking status refresh. Never reaps a child that is still alive.
    pub fn poll(&mut self) -> ProcessResult<ProcessState> {
        if self.state.can_query() {
            let raw = wait_raw(self.pid, poll_flags())
                .map_err(|errno| ProcessError::wait(self.name.as_str(), self.pid.as_raw(), errno))?;
            if let Some(raw) = raw {
                let status = self.decode(raw)?;
                self.observe(status)?;
            }
        }
        Ok(self.state())
    }

    /// True while the child exists and has neither exited nor been killed.
    /// A stopped child counts as running.
    pub fn is_running(&mut self) -> ProcessResult<bool> {
        Ok(self.poll()?.is_alive())
    }

    pub fn is_stopped(&mut self) -> ProcessResult<bool> {
        Ok(self.poll()? == ProcessState::Stopped)
    }

    /// True when the latest observed transition was caused by a signal:
    /// the child is stopped, or it was killed.
    pub fn is_signaled(&mut self) -> ProcessResult<bool> {
        Ok(matches!(
            self.poll()?,
            ProcessState::Stopped | ProcessState::Signaled
        ))
    }

    /// Block until the child exits or is killed, and reap it.
    ///
    /// Stops and continues do not end the wait. Once the result is latched
    /// further calls return it without touching the kernel.
    pub fn wait(&mut self) -> ProcessResult<ExitStatus> {
        if let Some(result) = self.result {
            return Ok(result);
        }

        debug!("Waiting for {} (pid {})", self.name, self.pid);
        loop {
            let raw = wait_raw(self.pid, WaitPidFlag::empty())
                .map_err(|errno| ProcessError::wait(self.name.as_str(), self.pid.as_raw(), errno))?;
            let Some(raw) = raw else {
                continue;
            };
            let status = self.decode(raw)?;
            self.observe(status)?;
            if status.is_terminal() {
                return Ok(status);
            }
        }
    }

    /// Suspend the child. The effect shows up on the next status query.
    pub fn stop(&mut self) -> ProcessResult<()> {
        self.send(Signal::SIGSTOP)
    }

    /// Continue a stopped child.
    pub fn resume(&mut self) -> ProcessResult<()> {
        self.continue_child("SIGCONT delivered")
    }

    /// Send an arbitrary signal. A later `wait()` reports it if it was fatal.
    ///
    /// A stopped child keeps catchable signals pending until it runs again,
    /// so every signal except SIGKILL and the job-control signals is followed
    /// by a SIGCONT. This also covers a stop that no poll has observed yet.
    pub fn kill(&mut self, signal: Signal) -> ProcessResult<()> {
        match signal {
            Signal::SIGCONT => self.resume(),
            Signal::SIGKILL
            | Signal::SIGSTOP
            | Signal::SIGTSTP
            | Signal::SIGTTIN
            | Signal::SIGTTOU => self.send(signal),
            _ => {
                self.send(signal)?;
                self.continue_child(&format!("SIGCONT after {}", signal))
            }
        }
    }

    pub fn terminate(&mut self) -> ProcessResult<()> {
        self.kill(Signal::SIGTERM)
    }

    pub fn force_kill(&mut self) -> ProcessResult<()> {
        self.send(Signal::SIGKILL)
    }

    /// Exit code of a normal exit, once reaped.
    pub fn exit_code(&self) -> Option<u8> {
        self.result.and_then(|status| status.exit_code())
    }

    /// Signal that killed the child, once reaped.
    pub fn termination_signal(&self) -> Option<i32> {
        self.result
            .filter(|status| status.signaled())
            .and_then(|status| status.signal())
    }

    /// Terminal result if the child has been reaped.
    pub fn result(&self) -> Option<ExitStatus> {
        self.result
    }

    pub fn is_reaped(&self) -> bool {
        self.result.is_some()
    }

    fn send(&mut self, signal: Signal) -> ProcessResult<()> {
        if self.state().is_terminal() {
            return Err(ProcessError::signal_delivery(
                self.name.as_str(),
                self.pid.as_raw(),
                signal.as_str(),
                "process already reaped",
            ));
        }
        send_signal(self.name.as_str(), self.pid, signal)
    }

    fn continue_child(&mut self, reason: &str) -> ProcessResult<()> {
        self.send(Signal::SIGCONT)?;
        // The kernel resumes a stopped task as soon as SIGCONT is generated.
        if self.state() == ProcessState::Stopped {
            self.state.transition_to_running(reason)?;
        }
        Ok(())
    }

    fn decode(&self, raw: i32) -> ProcessResult<ExitStatus> {
        decode_wait_status(raw).ok_or_else(|| {
            error!(
                "Unrecognized wait status {:#x} for {} (pid {})",
                raw, self.name, self.pid
            );
            ProcessError::decode(self.pid.as_raw(), raw)
        })
    }

    fn observe(&mut self, status: ExitStatus) -> ProcessResult<()> {
        match status {
            ExitStatus::Exited(_) => {
                self.state.transition_to_terminated(status.to_string())?;
            }
            ExitStatus::Signaled { .. } => {
                self.state.transition_to_signaled(status.to_string())?;
            }
            ExitStatus::Stopped(_) => {
                self.state.transition_to_stopped(&status.to_string())?;
            }
        }

        if status.is_terminal() {
            self.result = Some(status);
            info!("Process {} (pid {}) {}", self.name, self.pid, status);
        } else {
            debug!("Process {} (pid {}) {}", self.name, self.pid, status);
        }
        Ok(())
    }
}
