//! Error types for forkproc.
//!
//! Two families live here:
//! - [`ProcessError`] for fork, wait, signal and state-machine failures.
//! - [`ShmError`] for the shared-memory key/value store.
//!
//! Failures raised inside a child's callback never appear here. They are
//! collapsed into the child's exit code before they could cross the fork
//! boundary.

use nix::errno::Errno;
use thiserror::Error;

/// Process lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The kernel refused to create a child (usually `EAGAIN`/`ENOMEM`).
    #[error("Process fork failed: {id} - {errno}")]
    Fork { id: String, errno: Errno },

    /// An operation was invoked out of order.
    #[error("Process state error: {id} - expected {expected}, got {actual}")]
    InvalidState {
        id: String,
        expected: String,
        actual: String,
    },

    /// A signal could not be delivered to the child.
    #[error("Signal delivery failed: {id} (pid {pid}) - {signal}: {reason}")]
    SignalDelivery {
        id: String,
        pid: i32,
        signal: String,
        reason: String,
    },

    /// `waitpid` itself failed.
    #[error("Process wait failed: {id} (pid {pid}) - {errno}")]
    Wait { id: String, pid: i32, errno: Errno },

    /// The kernel reported a wait status that is neither exited, signaled nor
    /// stopped.
    #[error("Unrecognized wait status {status:#x} for pid {pid}")]
    Decode { pid: i32, status: i32 },
}

impl ProcessError {
    pub fn fork(id: impl Into<String>, errno: Errno) -> Self {
        Self::Fork {
            id: id.into(),
            errno,
        }
    }

    pub fn invalid_state(
        id: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            id: id.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn signal_delivery(
        id: impl Into<String>,
        pid: i32,
        signal: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SignalDelivery {
            id: id.into(),
            pid,
            signal: signal.into(),
            reason: reason.into(),
        }
    }

    pub fn wait(id: impl Into<String>, pid: i32, errno: Errno) -> Self {
        Self::Wait {
            id: id.into(),
            pid,
            errno,
        }
    }

    pub fn decode(pid: i32, status: i32) -> Self {
        Self::Decode { pid, status }
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// Only resource exhaustion during fork qualifies.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProcessError::Fork {
                errno: Errno::EAGAIN | Errno::ENOMEM,
                ..
            }
        )
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Shared-memory store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShmError {
    #[error("Shared memory attach failed: {path} - {reason}")]
    Attach { path: String, reason: String },

    #[error("Shared memory key not found: {key}")]
    NotFound { key: String },

    /// The handle was closed or destroyed before this call.
    #[error("Shared memory handle is closed")]
    Closed,

    #[error("Shared memory value error: {key} - {reason}")]
    Serialization { key: String, reason: String },

    #[error("Shared memory segment is corrupted: {reason}")]
    Corrupted { reason: String },

    #[error("Shared memory removal failed: {reason}")]
    Remove { reason: String },

    #[error("Invalid shared memory size: {input}")]
    InvalidSize { input: String },
}

impl ShmError {
    pub fn attach(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Attach {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn serialization(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Serialization {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::Corrupted {
            reason: reason.into(),
        }
    }

    pub fn remove(reason: impl Into<String>) -> Self {
        Self::Remove {
            reason: reason.into(),
        }
    }

    pub fn invalid_size(input: impl Into<String>) -> Self {
        Self::InvalidSize {
            input: input.into(),
        }
    }
}

/// Result type for shared-memory operations.
pub type ShmResult<T> = std::result::Result<T, ShmError>;
