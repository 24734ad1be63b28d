//! The `Process` façade.
//!
//! Wires the launcher's pid into a [`ProcessController`] and forwards
//! queries to it. One `Process` maps to at most one kernel process.
//!
//! Before `start()` there is no process, and that is a valid answer rather
//! than an error: `pid()` and `exit_code()` are `None`, `is_running()` is
//! false, `wait()` returns `Ok(None)` and signal operations do nothing.

use forkproc_common::{ProcessError, ProcessName, ProcessResult};
use forkproc_process::{launch, Callback, ExitStatus, Pid, ProcessController, Signal};
use forkproc_process_state::ProcessState;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Process {
    name: ProcessName,
    callback: Callback,
    controller: Option<ProcessController>,
}

impl Process {
    pub fn new(callback: Callback) -> Self {
        Self::named(ProcessName::default(), callback)
    }

    /// Process with a name used in logs and errors.
    pub fn named(name: impl Into<ProcessName>, callback: Callback) -> Self {
        Self {
            name: name.into(),
            callback,
            controller: None,
        }
    }

    pub fn name(&self) -> &ProcessName {
        &self.name
    }

    /// Fork and run the callback in the child. Returns without waiting.
    ///
    /// Fails with [`ProcessError::InvalidState`] if this instance was already
    /// started. A failed fork leaves the instance unstarted, so `start()` can
    /// be retried.
    pub fn start(&mut self) -> ProcessResult<Pid> {
        if let Some(controller) = &self.controller {
            return Err(ProcessError::invalid_state(
                self.name.as_str(),
                ProcessState::NotStarted.to_string(),
                controller.state().to_string(),
            ));
        }

        let pid = launch(&self.name, &self.callback)?;
        self.controller = Some(ProcessController::new(self.name.clone(), pid)?);
        Ok(pid)
    }

    /// `start()` followed by a blocking `wait()`.
    pub fn run(&mut self) -> ProcessResult<ExitStatus> {
        self.start()?;
        self.wait()?.ok_or_else(|| {
            ProcessError::invalid_state(
                self.name.as_str(),
                ProcessState::Running.to_string(),
                ProcessState::NotStarted.to_string(),
            )
        })
    }

    /// Block until the child exits or is killed. Repeated calls return the
    /// same result.
    pub fn wait(&mut self) -> ProcessResult<Option<ExitStatus>> {
        match self.controller.as_mut() {
            Some(controller) => controller.wait().map(Some),
            None => Ok(None),
        }
    }

    /// Suspend the child (SIGSTOP).
    pub fn stop(&mut self) -> ProcessResult<()> {
        self.with_controller("stop", ProcessController::stop)
    }

    /// Continue a stopped child (SIGCONT).
    pub fn resume(&mut self) -> ProcessResult<()> {
        self.with_controller("resume", ProcessController::resume)
    }

    /// Send `signal` to the child.
    pub fn kill(&mut self, signal: Signal) -> ProcessResult<()> {
        self.with_controller("kill", |controller| controller.kill(signal))
    }

    /// Ask the child to terminate (SIGTERM).
    pub fn terminate(&mut self) -> ProcessResult<()> {
        self.with_controller("terminate", ProcessController::terminate)
    }

    pub fn is_running(&mut self) -> ProcessResult<bool> {
        match self.controller.as_mut() {
            Some(controller) => controller.is_running(),
            None => Ok(false),
        }
    }

    pub fn is_stopped(&mut self) -> ProcessResult<bool> {
        match self.controller.as_mut() {
            Some(controller) => controller.is_stopped(),
            None => Ok(false),
        }
    }

    /// True when the child is stopped or was killed by a signal.
    pub fn is_signaled(&mut self) -> ProcessResult<bool> {
        match self.controller.as_mut() {
            Some(controller) => controller.is_signaled(),
            None => Ok(false),
        }
    }

    pub fn pid(&self) -> Option<Pid> {
        self.controller.as_ref().map(ProcessController::pid)
    }

    /// Exit code of a normal exit, once the child has been reaped.
    pub fn exit_code(&self) -> Option<u8> {
        self.controller.as_ref().and_then(ProcessController::exit_code)
    }

    /// Signal number that killed the child, once reaped.
    pub fn termination_signal(&self) -> Option<i32> {
        self.controller
            .as_ref()
            .and_then(ProcessController::termination_signal)
    }

    /// Last observed state, without querying the kernel.
    pub fn state(&self) -> ProcessState {
        self.controller
            .as_ref()
            .map(ProcessController::state)
            .unwrap_or(ProcessState::NotStarted)
    }

    fn with_controller(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut ProcessController) -> ProcessResult<()>,
    ) -> ProcessResult<()> {
        match self.controller.as_mut() {
            Some(controller) => f(controller),
            None => {
                debug!("Ignoring {} on {}: not started", operation, self.name);
                Ok(())
            }
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if let Some(controller) = &self.controller {
            if !controller.is_reaped() {
                warn!(
                    "Process {} (pid {}) dropped without wait(); it stays a zombie once it exits",
                    self.name,
                    controller.pid()
                );
            }
        }
    }
}
