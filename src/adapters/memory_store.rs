//! RAM-backed blob store adapter
//!
//! Implements the BlobStore port on a fixed-capacity map. Used on boards
//! without a settings partition and as the store in host tests.

use heapless::{FnvIndexMap, String, Vec};

use crate::ports::storage::{BlobStore, StorageError};
use crate::settings_store::RECORD_CAPACITY;

/// Longest key accepted (matches the usual NVS limit)
pub const MAX_KEY_LEN: usize = 15;

/// In-memory blob store holding up to `N` records (`N` a power of two)
pub struct MemoryBlobStore<const N: usize> {
    blobs: FnvIndexMap<String<MAX_KEY_LEN>, Vec<u8, RECORD_CAPACITY>, N>,
    writes: u32,
}

impl<const N: usize> MemoryBlobStore<N> {
    pub fn new() -> Self {
        Self {
            blobs: FnvIndexMap::new(),
            writes: 0,
        }
    }

    /// Whether a blob is stored under `key`
    pub fn contains(&self, key: &str) -> bool {
        String::try_from(key)
            .map(|k| self.blobs.contains_key(&k))
            .unwrap_or(false)
    }

    /// Remove the blob under `key`, returning whether one existed
    pub fn remove(&mut self, key: &str) -> bool {
        String::try_from(key)
            .map(|k| self.blobs.remove(&k).is_some())
            .unwrap_or(false)
    }

    /// Number of successful writes since creation (for diagnostics)
    pub fn write_count(&self) -> u32 {
        self.writes
    }

    fn key(key: &str) -> Result<String<MAX_KEY_LEN>, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey);
        }
        String::try_from(key).map_err(|_| StorageError::InvalidKey)
    }
}

impl<const N: usize> Default for MemoryBlobStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BlobStore for MemoryBlobStore<N> {
    async fn get_blob(&mut self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let key = Self::key(key)?;
        let blob = self.blobs.get(&key).ok_or(StorageError::NotFound)?;
        let dest = buf
            .get_mut(..blob.len())
            .ok_or(StorageError::BufferTooSmall)?;
        dest.copy_from_slice(blob);
        Ok(blob.len())
    }

    async fn set_blob(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let key = Self::key(key)?;
        let blob = Vec::from_slice(data).map_err(|_| StorageError::TooLarge)?;
        self.blobs
            .insert(key, blob)
            .map_err(|_| StorageError::Full)?;
        self.writes += 1;
        Ok(())
    }
}
