//! # forkproc
//!
//! Run a unit of work in a forked child and observe or control it from the
//! parent.
//!
//! **Architecture:**
//! ```text
//! Process (façade, single use)
//!       ↓ start()
//! launcher::launch ── fork ──▶ child: callback ─▶ _exit(code)
//!       ↓ pid
//! ProcessController ── waitpid / kill ──▶ kernel
//!       ↓ raw status
//! decode_wait_status ─▶ ExitStatus
//! ```
//!
//! # Example
//! ```no_run
//! use forkproc::{Callback, CallbackResult, Process};
//!
//! fn compress(level: &u32) -> CallbackResult {
//!     let _ = level;
//!     Ok(0)
//! }
//!
//! let mut process = Process::named("compress", Callback::new(compress, 9));
//! let status = process.run()?;
//! assert_eq!(status.exit_code(), Some(0));
//! # Ok::<(), forkproc::ProcessError>(())
//! ```

pub mod logging;
pub mod process;

pub use process::Process;

pub use forkproc_common::{ProcessError, ProcessName, ProcessResult};
pub use forkproc_process::{
    child_exit, decode_wait_status, Callback, CallbackResult, ExitStatus, Pid, Signal,
    FAILURE_EXIT_CODE,
};
pub use forkproc_process_state::ProcessState;

#[cfg(feature = "shm")]
pub use forkproc_common::{ShmError, ShmResult};
#[cfg(feature = "shm")]
pub use forkproc_shm::{ShmConfig, SharedMemory};
