//! # forkproc shm
//!
//! A flat key/value store over a fixed-size System V shared memory segment.
//!
//! Memory written by a forked child is invisible to its parent. A segment
//! attached under a common key is the explicit channel for data that has to
//! cross the fork boundary:
//!
//! ```text
//! parent: SharedMemory::open(path) ──fork──▶ child: set("result", ..) ─▶ exit
//!    │                                                    
//!    └── wait() ──▶ get("result") ──▶ destroy()
//! ```
//!
//! The store does no cross-process locking. Writers and readers are expected
//! to be ordered by the process lifecycle (the child writes, the parent reads
//! after `wait()`).

pub mod config;
pub mod key;
pub mod segment;
pub mod size;
pub mod store;

pub use config::ShmConfig;
pub use key::{ipc_key, slot_id};
pub use size::parse_size;
pub use store::SharedMemory;
