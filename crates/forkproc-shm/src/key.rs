//! Deterministic key derivation.
//!
//! Both derivations use SHA-256 so the same input maps to the same key in
//! every process and every build:
//! - [`ipc_key`]: path -> System V `key_t` (first 4 digest bytes, big-endian,
//!   masked to a positive 31-bit value, never `IPC_PRIVATE`).
//! - [`slot_id`]: item key -> 64-bit slot id (first 8 digest bytes,
//!   big-endian).

use sha2::{Digest, Sha256};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

fn digest(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(bytes));
    out
}

/// IPC key for a segment named by `path`. The path does not need to exist.
pub fn ipc_key(path: &Path) -> libc::key_t {
    let hash = digest(path.as_os_str().as_bytes());
    let key = u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]]) & 0x7fff_ffff;
    if key == libc::IPC_PRIVATE as u32 {
        1
    } else {
        key as libc::key_t
    }
}

/// Slot id for an item key inside a segment.
pub fn slot_id(key: &str) -> u64 {
    let hash = digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(bytes)
}
