//! Storage port - abstraction over the persistent blob store
//!
//! Records are opaque byte blobs addressed by a short string key inside
//! one namespace. Writes are assumed atomic at blob granularity.

/// Error type for storage operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No blob stored under the key
    #[error("key not found")]
    NotFound,
    /// The stored blob does not fit the read buffer
    #[error("stored blob larger than buffer")]
    BufferTooSmall,
    /// The blob is larger than the store accepts
    #[error("blob too large")]
    TooLarge,
    /// The store is out of slots
    #[error("store full")]
    Full,
    /// Key is empty or too long for the backend
    #[error("invalid key")]
    InvalidKey,
    /// Flash or backend failure
    #[error("storage backend failure")]
    Backend,
}

/// Port for persisting opaque blobs
///
/// # Example Implementation
///
/// ```ignore
/// impl BlobStore for NvsPartition {
///     async fn get_blob(&mut self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
///         self.nvs.get_raw(key, buf)?.map(|b| b.len()).ok_or(StorageError::NotFound)
///     }
///     async fn set_blob(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
///         self.nvs.set_raw(key, data).map(|_| ()).map_err(|_| StorageError::Backend)
///     }
/// }
/// ```
pub trait BlobStore {
    /// Copy the blob stored under `key` into `buf`
    ///
    /// Returns the blob length.
    fn get_blob(
        &mut self,
        key: &str,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, StorageError>>;

    /// Store `data` under `key`, replacing any previous blob
    fn set_blob(
        &mut self,
        key: &str,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), StorageError>>;
}
