//! Owning handle for an attached System V shared memory segment.
//!
//! Detaches on drop. Removal (`IPC_RMID`) is explicit through
//! [`Segment::remove`].

use nix::errno::Errno;
use std::ptr::NonNull;

#[derive(Debug)]
pub struct Segment {
    id: libc::c_int,
    addr: NonNull<u8>,
    size: usize,
}

// SAFETY: the mapping is process-wide; the handle is moved, never shared,
// because every accessor that writes takes `&mut self`.
unsafe impl Send for Segment {}

impl Segment {
    /// Attach to the segment for `key`, creating it with `size` bytes and
    /// `permissions` if it does not exist yet.
    ///
    /// An existing segment keeps its original size, which may be larger than
    /// `size`. Asking for more than an existing segment holds fails with
    /// `EINVAL`.
    pub fn attach(key: libc::key_t, size: usize, permissions: u32) -> Result<Self, Errno> {
        let flags = libc::IPC_CREAT | (permissions & 0o777) as libc::c_int;
        // SAFETY: plain syscall; no pointers involved.
        let id = unsafe { libc::shmget(key, size, flags) };
        if id == -1 {
            return Err(Errno::last());
        }

        let size = Self::query_size(id)?;

        // SAFETY: `id` is a valid segment id; a null address lets the kernel
        // choose where to map it.
        let addr = unsafe { libc::shmat(id, std::ptr::null(), 0) };
        if addr as isize == -1 {
            return Err(Errno::last());
        }
        let addr = NonNull::new(addr as *mut u8).ok_or(Errno::EFAULT)?;

        Ok(Self { id, addr, size })
    }

    fn query_size(id: libc::c_int) -> Result<usize, Errno> {
        // SAFETY: shmid_ds is plain data; IPC_STAT fills it in.
        let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
        // SAFETY: `ds` is a valid, writable shmid_ds.
        let res = unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) };
        if res == -1 {
            return Err(Errno::last());
        }
        Ok(ds.shm_segsz as usize)
    }

    pub fn id(&self) -> libc::c_int {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the mapping is `size` bytes long and lives until detach.
        unsafe { std::slice::from_raw_parts(self.addr.as_ptr(), self.size) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` guarantees no other borrow in this
        // process.
        unsafe { std::slice::from_raw_parts_mut(self.addr.as_ptr(), self.size) }
    }

    /// Mark the segment for removal. It disappears once every process has
    /// detached.
    pub fn remove(&self) -> Result<(), Errno> {
        // SAFETY: IPC_RMID ignores the buffer argument.
        let res = unsafe { libc::shmctl(self.id, libc::IPC_RMID, std::ptr::null_mut()) };
        if res == -1 {
            Err(Errno::last())
        } else {
            Ok(())
        }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        // SAFETY: `addr` came from shmat and is detached exactly once.
        let res = unsafe { libc::shmdt(self.addr.as_ptr() as *const libc::c_void) };
        if res == -1 {
            tracing::warn!("Failed to detach shared memory segment {}: {}", self.id, Errno::last());
        }
    }
}
