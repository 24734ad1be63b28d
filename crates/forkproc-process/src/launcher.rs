//! Fork a child that runs exactly one callback.
//!
//! The child never returns into the caller's stack. Whatever the callback
//! does, the child leaves through `_exit(2)` with a deterministic code:
//!
//! | callback outcome        | exit code                |
//! |-------------------------|--------------------------|
//! | `Ok(code)`              | `code`                   |
//! | `Err(_)`                | [`FAILURE_EXIT_CODE`]    |
//! | panic                   | [`FAILURE_EXIT_CODE`]    |
//! | [`child_exit`]`(n)`     | `n & 0xff`               |
//!
//! The failure itself stays in the child. Richer results have to travel
//! through an explicit channel such as `forkproc-shm`.

use forkproc_common::{ProcessError, ProcessName, ProcessResult};
use nix::unistd::{fork, ForkResult, Pid};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Exit code used when the callback fails or panics.
pub const FAILURE_EXIT_CODE: u8 = 255;

/// What a callback returns: the exit code for the child, or a failure.
pub type CallbackResult = anyhow::Result<u8>;

/// A unit of work to run in a forked child.
///
/// Built from a plain function pointer plus an owned argument, so the code
/// the child runs is always a named function and nothing is captured
/// implicitly (open sockets, held locks) from the caller's environment.
///
/// # Example
/// ```
/// use forkproc_process::{Callback, CallbackResult};
///
/// fn resize(width: &u32) -> CallbackResult {
///     let _ = width;
///     Ok(0)
/// }
///
/// let callback = Callback::new(resize, 640);
/// ```
pub struct Callback {
    entry: Box<dyn Fn() -> CallbackResult + Send>,
}

impl Callback {
    /// Callback that calls `entry(&arg)` in the child.
    pub fn new<A>(entry: fn(&A) -> CallbackResult, arg: A) -> Self
    where
        A: Send + 'static,
    {
        Self {
            entry: Box::new(move || entry(&arg)),
        }
    }

    /// Callback without an argument.
    pub fn from_fn(entry: fn() -> CallbackResult) -> Self {
        Self {
            entry: Box::new(entry),
        }
    }

    fn invoke(&self) -> CallbackResult {
        (self.entry)()
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}

/// Fork and run `callback` in the child.
///
/// Returns the child's pid in the parent without waiting for it. If the
/// fork fails no child exists and [`ProcessError::Fork`] is returned; the
/// callback is only borrowed, so the caller can retry with it.
pub fn launch(name: &ProcessName, callback: &Callback) -> ProcessResult<Pid> {
    // SAFETY: the child only runs the callback and then `_exit`s. It never
    // returns into the parent's stack, so no destructor or atexit handler
    // from the parent runs twice. Callbacks must stick to work that is safe
    // in a forked copy of a possibly multithreaded process.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            tracing::info!("Launched {} with PID {}", name, child);
            Ok(child)
        }
        Ok(ForkResult::Child) => run_child(callback),
        Err(errno) => {
            let error = ProcessError::fork(name.as_str(), errno);
            if error.is_retryable() {
                tracing::warn!(
                    "Failed to fork {}: {} (out of resources, may be retried)",
                    name,
                    errno
                );
            } else {
                tracing::error!("Failed to fork {}: {}", name, errno);
            }
            Err(error)
        }
    }
}

// No logging or stdio locking from here on: another thread may have held
// those locks at the moment of the fork. Tracing events go to a no-op
// dispatcher and a panic is not reported on stderr.
fn run_child(callback: &Callback) -> ! {
    let _quiet = tracing::dispatcher::set_default(&tracing::Dispatch::none());
    panic::set_hook(Box::new(|_| {}));

    let code = match panic::catch_unwind(AssertUnwindSafe(|| callback.invoke())) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) | Err(_) => FAILURE_EXIT_CODE,
    };
    child_exit(i32::from(code))
}

/// Terminate the current (child) process immediately with `code`.
///
/// Calls `_exit(2)` directly, never `std::process::exit`. The kernel keeps
/// only the low 8 bits, so `child_exit(256)` is observed as exit code 0.
///
/// Buffered `std::io::stdout` output is not flushed: its lock may have been
/// held by another parent thread when the fork happened. Callbacks that
/// print must flush before returning.
pub fn child_exit(code: i32) -> ! {
    // SAFETY: `_exit` never returns and runs no atexit handlers or
    // destructors, so nothing the parent registered runs in the child.
    unsafe { libc::_exit(code) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(value: &u8) -> CallbackResult {
        Ok(value * 2)
    }

    fn fail() -> CallbackResult {
        anyhow::bail!("boom")
    }

    #[test]
    fn test_callback_with_argument() {
        let callback = Callback::new(double, 21);
        assert_eq!(callback.invoke().unwrap(), 42);
    }

    #[test]
    fn test_callback_error_is_returned() {
        let callback = Callback::from_fn(fail);
        assert!(callback.invoke().is_err());
    }

    #[test]
    fn test_callback_debug() {
        let callback = Callback::from_fn(|| Ok(0));
        assert!(format!("{:?}", callback).starts_with("Callback"));
    }
}
