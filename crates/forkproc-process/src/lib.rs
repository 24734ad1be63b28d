//! # forkproc process
//!
//! Low-level process primitives for forkproc.
//!
//! This crate provides Unix primitives for:
//! - Forking a child that runs one callback ([`launcher`])
//! - Decoding raw wait statuses ([`exit_status`])
//! - Non-blocking and blocking `waitpid` ([`wait`])
//! - Signal delivery ([`signal`])
//! - Observing and controlling one launched child ([`controller`])

pub mod controller;
pub mod exit_status;
pub mod launcher;
pub mod signal;
pub mod wait;

// Re-export main types
pub use controller::ProcessController;
pub use exit_status::{decode_wait_status, ExitStatus};
pub use launcher::{child_exit, launch, Callback, CallbackResult, FAILURE_EXIT_CODE};
pub use signal::*;

pub use nix::sys::signal::Signal;
pub use nix::unistd::Pid;
