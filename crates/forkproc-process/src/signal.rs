//! Signal delivery.

use forkproc_common::{ProcessError, ProcessResult};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Send `signal` to `pid`, labelling failures with `id`.
///
/// `ESRCH` (no such process) surfaces as [`ProcessError::SignalDelivery`];
/// nothing is retried.
pub fn send_signal(id: &str, pid: Pid, signal: Signal) -> ProcessResult<()> {
    tracing::debug!("Sending {} to {} (pid {})", signal, id, pid);
    kill(pid, signal).map_err(|e| {
        ProcessError::signal_delivery(id, pid.as_raw(), signal.as_str(), e.desc())
    })
}

