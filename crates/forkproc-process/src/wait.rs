//! Thin `waitpid(2)` wrapper returning the raw status.
//!
//! nix's `waitpid` decodes the status itself; here the raw integer is kept so
//! [`crate::exit_status::decode_wait_status`] stays the single decoder.

use nix::errno::Errno;
use nix::sys::wait::WaitPidFlag;
use nix::unistd::Pid;

/// Flags for a status query that must neither block nor miss a stop.
pub fn poll_flags() -> WaitPidFlag {
    WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED
}

/// Call `waitpid` for one pid, retrying on `EINTR`.
///
/// Returns `Ok(None)` when `WNOHANG` was given and the child has no status
/// change to report.
pub fn wait_raw(pid: Pid, flags: WaitPidFlag) -> Result<Option<i32>, Errno> {
    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: `status` is a valid, writable c_int for the whole call.
        let res = unsafe { libc::waitpid(pid.as_raw(), &mut status, flags.bits()) };
        match res {
            -1 => match Errno::last() {
                Errno::EINTR => continue,
                errno => return Err(errno),
            },
            0 => return Ok(None),
            _ => return Ok(Some(status)),
        }
    }
}
