//! # forkproc common
//!
//! Types shared by every forkproc crate: the error taxonomy for process
//! lifecycle and shared-memory operations, plus small identifier types used
//! as logging context.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{ProcessError, ProcessResult, ShmError, ShmResult};
pub use types::ProcessName;
