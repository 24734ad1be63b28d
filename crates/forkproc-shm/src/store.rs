//! The key/value store.
//!
//! Segment layout:
//!
//! ```text
//! 0       4          8                      8 + len
//! | magic | len (LE) | JSON table ...        | unused ...
//! ```
//!
//! The table maps [`slot_id`] values to `{key, value}` entries. A segment
//! that is still all zeroes reads as an empty table.

use crate::config::ShmConfig;
use crate::key::{ipc_key, slot_id};
use crate::segment::Segment;
use crate::size::parse_size;
use forkproc_common::{ShmError, ShmResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bytes reserved at the start of the segment.
pub const HEADER_LEN: usize = 8;

const MAGIC: [u8; 4] = *b"FKSM";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: serde_json::Value,
}

type Table = BTreeMap<u64, Entry>;

/// Handle to a named shared-memory key/value segment.
///
/// Operations after [`close`](SharedMemory::close) or
/// [`destroy`](SharedMemory::destroy) fail with [`ShmError::Closed`].
#[derive(Debug)]
pub struct SharedMemory {
    path: PathBuf,
    key: libc::key_t,
    segment: Option<Segment>,
}

impl SharedMemory {
    /// Attach to (creating if absent) the segment named by `path`.
    ///
    /// `size` accepts the suffixes understood by [`parse_size`]. Without it
    /// the size comes from [`ShmConfig::from_env`].
    pub fn open(path: impl AsRef<Path>, size: Option<&str>, permissions: u32) -> ShmResult<Self> {
        let size = match size {
            Some(size) => parse_size(size)?,
            None => {
                ShmConfig::from_env()
                    .map_err(|e| ShmError::invalid_size(format!("{:#}", e)))?
                    .default_size
            }
        };
        Self::attach(path.as_ref(), size, permissions)
    }

    /// Attach using the size and permissions from `config`.
    pub fn open_with_config(path: impl AsRef<Path>, config: &ShmConfig) -> ShmResult<Self> {
        Self::attach(path.as_ref(), config.default_size, config.permissions)
    }

    fn attach(path: &Path, size: usize, permissions: u32) -> ShmResult<Self> {
        if size <= HEADER_LEN {
            return Err(ShmError::invalid_size(size.to_string()));
        }

        let key = ipc_key(path);
        let segment = Segment::attach(key, size, permissions)
            .map_err(|errno| ShmError::attach(path.display().to_string(), errno.desc()))?;

        info!(
            "Attached shared memory {} (key {:#x}, {} bytes)",
            path.display(),
            key,
            segment.size()
        );

        Ok(Self {
            path: path.to_path_buf(),
            key,
            segment: Some(segment),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ipc_key(&self) -> libc::key_t {
        self.key
    }

    /// Size of the attached segment, `None` once closed.
    pub fn size(&self) -> Option<usize> {
        self.segment.as_ref().map(Segment::size)
    }

    /// Whether the handle is still attached.
    pub fn is_enabled(&self) -> bool {
        self.segment.is_some()
    }

    /// Read the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> ShmResult<T> {
        let table = self.read_table()?;
        let entry = Self::lookup(&table, key).ok_or_else(|| ShmError::not_found(key))?;
        serde_json::from_value(entry.value.clone())
            .map_err(|e| ShmError::serialization(key, e.to_string()))
    }

    /// Store `value` under `key`.
    ///
    /// Returns `Ok(false)` when the table would no longer fit in the segment;
    /// the segment is left unchanged in that case.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> ShmResult<bool> {
        let value =
            serde_json::to_value(value).map_err(|e| ShmError::serialization(key, e.to_string()))?;

        let mut table = self.read_table()?;
        let slot = slot_id(key);
        if let Some(existing) = table.get(&slot) {
            if existing.key != key {
                return Err(ShmError::serialization(
                    key,
                    format!("slot {:#x} already holds key {}", slot, existing.key),
                ));
            }
        }
        table.insert(
            slot,
            Entry {
                key: key.to_string(),
                value,
            },
        );

        let stored = self.write_table(&table)?;
        if stored {
            debug!("Stored {} in shared memory {}", key, self.path.display());
        } else {
            debug!(
                "No space for {} in shared memory {}",
                key,
                self.path.display()
            );
        }
        Ok(stored)
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete(&mut self, key: &str) -> ShmResult<bool> {
        let mut table = self.read_table()?;
        if Self::lookup(&table, key).is_none() {
            return Ok(false);
        }
        table.remove(&slot_id(key));
        self.write_table(&table)
    }

    pub fn has(&self, key: &str) -> ShmResult<bool> {
        Ok(Self::lookup(&self.read_table()?, key).is_some())
    }

    /// Delete every item. The segment stays attached.
    pub fn clear(&mut self) -> ShmResult<()> {
        let segment = self.segment.as_mut().ok_or(ShmError::Closed)?;
        segment.as_mut_slice()[..HEADER_LEN].fill(0);
        debug!("Cleared shared memory {}", self.path.display());
        Ok(())
    }

    /// Detach from the segment. The segment and its data stay in the system.
    pub fn close(&mut self) {
        if self.segment.take().is_some() {
            debug!("Detached shared memory {}", self.path.display());
        }
    }

    /// Remove the segment from the system and detach.
    pub fn destroy(&mut self) -> ShmResult<()> {
        let Some(segment) = self.segment.take() else {
            return Ok(());
        };
        segment
            .remove()
            .map_err(|errno| ShmError::remove(errno.desc()))?;
        info!("Removed shared memory {}", self.path.display());
        Ok(())
    }

    fn lookup<'a>(table: &'a Table, key: &str) -> Option<&'a Entry> {
        table.get(&slot_id(key)).filter(|entry| entry.key == key)
    }

    fn read_table(&self) -> ShmResult<Table> {
        let bytes = self.segment.as_ref().ok_or(ShmError::Closed)?.as_slice();

        let magic = &bytes[..4];
        if magic == [0u8; 4] {
            return Ok(Table::new());
        }
        if magic != MAGIC {
            return Err(ShmError::corrupted(format!("bad magic {:02x?}", magic)));
        }

        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let body = bytes
            .get(HEADER_LEN..HEADER_LEN + len)
            .ok_or_else(|| ShmError::corrupted(format!("table length {} exceeds segment", len)))?;

        serde_json::from_slice(body).map_err(|e| ShmError::corrupted(e.to_string()))
    }

    fn write_table(&mut self, table: &Table) -> ShmResult<bool> {
        let body = serde_json::to_vec(table)
            .map_err(|e| ShmError::serialization("<table>", e.to_string()))?;

        let segment = self.segment.as_mut().ok_or(ShmError::Closed)?;
        if HEADER_LEN + body.len() > segment.size() || body.len() > u32::MAX as usize {
            return Ok(false);
        }

        let bytes = segment.as_mut_slice();
        bytes[HEADER_LEN..HEADER_LEN + body.len()].copy_from_slice(&body);
        bytes[4..HEADER_LEN].copy_from_slice(&(body.len() as u32).to_le_bytes());
        bytes[..4].copy_from_slice(&MAGIC);
        Ok(true)
    }
}
