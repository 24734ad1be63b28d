//! Wait-status decoding.
//!
//! The kernel packs the outcome of a child's state change into a single
//! integer. [`decode_wait_status`] turns it into an [`ExitStatus`], which is
//! always exactly one of exited, signaled or stopped.

use nix::sys::signal::Signal;
use std::fmt;

/// Decoded outcome of a `waitpid` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The child ran to completion through its own exit call.
    Exited(u8),
    /// The child was terminated by an uncaught signal.
    Signaled { signal: i32, core_dumped: bool },
    /// The child is suspended by a stop signal. It still holds its pid.
    Stopped(i32),
}

impl ExitStatus {
    pub fn exited(&self) -> bool {
        matches!(self, ExitStatus::Exited(_))
    }

    pub fn signaled(&self) -> bool {
        matches!(self, ExitStatus::Signaled { .. })
    }

    pub fn stopped(&self) -> bool {
        matches!(self, ExitStatus::Stopped(_))
    }

    /// Exit code, only for a normal exit.
    pub fn exit_code(&self) -> Option<u8> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            _ => None,
        }
    }

    /// Raw signal number for signaled or stopped children.
    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(_) => None,
            ExitStatus::Signaled { signal, .. } => Some(*signal),
            ExitStatus::Stopped(signal) => Some(*signal),
        }
    }

    /// The signal as a [`Signal`] when the number is one nix knows about.
    pub fn signal_kind(&self) -> Option<Signal> {
        self.signal().and_then(|s| Signal::try_from(s).ok())
    }

    pub fn core_dumped(&self) -> bool {
        matches!(self, ExitStatus::Signaled { core_dumped: true, .. })
    }

    /// Whether the child is gone (exited or killed) and has been reaped.
    pub fn is_terminal(&self) -> bool {
        !self.stopped()
    }

    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |signal: i32| {
            Signal::try_from(signal)
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|_| signal.to_string())
        };
        match self {
            ExitStatus::Exited(code) => write!(f, "exited with code {}", code),
            ExitStatus::Signaled {
                signal,
                core_dumped,
            } => {
                write!(f, "killed by {}", name(*signal))?;
                if *core_dumped {
                    write!(f, " (core dumped)")?;
                }
                Ok(())
            }
            ExitStatus::Stopped(signal) => write!(f, "stopped by {}", name(*signal)),
        }
    }
}

/// Decode a raw wait status.
///
/// Returns `None` for anything other than exited, signaled or stopped (for
/// example a "continued" report, which this crate never requests).
pub fn decode_wait_status(status: i32) -> Option<ExitStatus> {
    if libc::WIFEXITED(status) {
        // WEXITSTATUS already masks to the low 8 bits.
        Some(ExitStatus::Exited(libc::WEXITSTATUS(status) as u8))
    } else if libc::WIFSIGNALED(status) {
        Some(ExitStatus::Signaled {
            signal: libc::WTERMSIG(status),
            core_dumped: libc::WCOREDUMP(status),
        })
    } else if libc::WIFSTOPPED(status) {
        Some(ExitStatus::Stopped(libc::WSTOPSIG(status)))
    } else {
        None
    }
}
