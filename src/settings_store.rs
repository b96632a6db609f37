//! Settings store
//!
//! Load-or-default persistence of the settings and calibration records,
//! plus the shared singletons both execution contexts read from.
//!
//! A record that is missing, undecodable, the wrong size or from an
//! incompatible schema is replaced by the compiled-in default, which is
//! written back before use. Startup never blocks on a bad record.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{CALIBRATION_KEY, SETTINGS_KEY};
use crate::domain::{PhCalibration, SystemSettings};
use crate::ports::storage::{BlobStore, StorageError};

/// Largest encoded record the store handles
pub const RECORD_CAPACITY: usize = 64;

/// Error type for settings persistence
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// Record was built for another major schema version
    #[error("incompatible schema version {major}.{minor}")]
    IncompatibleVersion { major: u8, minor: u8 },
    /// Record could not be encoded
    #[error("record encoding failed")]
    Encode,
    /// Blob store refused the write
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A fixed-size record persisted under its own key
pub trait PersistedRecord: Serialize + DeserializeOwned + Copy {
    /// Key the record is stored under
    const KEY: &'static str;

    /// Whether a decoded record may be used as-is
    fn is_acceptable(&self) -> bool {
        true
    }
}

impl PersistedRecord for SystemSettings {
    const KEY: &'static str = SETTINGS_KEY;

    fn is_acceptable(&self) -> bool {
        self.is_current_schema()
    }
}

impl PersistedRecord for PhCalibration {
    const KEY: &'static str = CALIBRATION_KEY;
}

/// Why a stored record was not used
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadMiss {
    Storage(StorageError),
    Malformed,
    SizeMismatch,
    Rejected,
}

/// Records loaded at boot
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersistedState {
    pub settings: SystemSettings,
    pub calibration: PhCalibration,
}

/// Typed load/save on top of a blob store
pub struct SettingsStore<B: BlobStore> {
    store: B,
}

impl<B: BlobStore> SettingsStore<B> {
    pub fn new(store: B) -> Self {
        Self { store }
    }

    /// Get the underlying blob store
    pub fn store(&self) -> &B {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut B {
        &mut self.store
    }

    pub fn into_inner(self) -> B {
        self.store
    }

    /// Read and decode the record stored under `R::KEY`
    pub async fn load<R: PersistedRecord>(&mut self) -> Result<R, LoadMiss> {
        let mut buf = [0u8; RECORD_CAPACITY];
        let len = self
            .store
            .get_blob(R::KEY, &mut buf)
            .await
            .map_err(LoadMiss::Storage)?;

        let bytes = buf.get(..len).ok_or(LoadMiss::SizeMismatch)?;
        let (record, rest) =
            postcard::take_from_bytes::<R>(bytes).map_err(|_| LoadMiss::Malformed)?;
        if !rest.is_empty() {
            return Err(LoadMiss::SizeMismatch);
        }
        if !record.is_acceptable() {
            return Err(LoadMiss::Rejected);
        }

        Ok(record)
    }

    /// Load `R`, or write `default` back and use it
    ///
    /// A failed write-back is logged; the default is still returned.
    pub async fn load_or_default<R: PersistedRecord>(&mut self, default: R) -> R {
        match self.load::<R>().await {
            Ok(record) => {
                info!("{}: loaded", R::KEY);
                record
            }
            Err(miss) => {
                match miss {
                    LoadMiss::Storage(StorageError::NotFound) => {
                        info!("{}: not found, writing default", R::KEY)
                    }
                    other => warn!("{}: unusable ({:?}), writing default", R::KEY, other),
                }
                if let Err(e) = self.save(&default).await {
                    warn!("{}: failed to persist default: {}", R::KEY, e);
                }
                default
            }
        }
    }

    /// Encode and store `record` under `R::KEY`
    pub async fn save<R: PersistedRecord>(&mut self, record: &R) -> Result<(), SettingsError> {
        let mut buf = [0u8; RECORD_CAPACITY];
        let encoded = postcard::to_slice(record, &mut buf).map_err(|_| SettingsError::Encode)?;
        self.store.set_blob(R::KEY, encoded).await?;
        Ok(())
    }

    /// Load both records with default fallback
    pub async fn load_all(&mut self) -> PersistedState {
        let settings = self.load_or_default(SystemSettings::DEFAULT).await;
        let calibration = self.load_or_default(PhCalibration::DEFAULT).await;
        PersistedState {
            settings,
            calibration,
        }
    }

    /// Validate and persist a settings update
    ///
    /// The caller swaps the live record only after this succeeds.
    pub async fn save_settings(&mut self, settings: &SystemSettings) -> Result<(), SettingsError> {
        if !settings.is_current_schema() {
            return Err(SettingsError::IncompatibleVersion {
                major: settings.version.major,
                minor: settings.version.minor,
            });
        }
        self.save(settings).await
    }
}

/// Process-wide record readable from every execution context
///
/// Reads return a full copy; writers build a complete new record and swap
/// it in one step, so no reader can observe a half-updated record.
pub struct SharedRecord<M: RawMutex, T: Copy> {
    inner: BlockingMutex<M, Cell<T>>,
}

impl<M: RawMutex, T: Copy> SharedRecord<M, T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: BlockingMutex::new(Cell::new(value)),
        }
    }

    /// Copy of the current record
    pub fn get(&self) -> T {
        self.inner.lock(|cell| cell.get())
    }

    /// Swap in `value`, returning the previous record
    pub fn replace(&self, value: T) -> T {
        self.inner.lock(|cell| cell.replace(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryBlobStore;
    use crate::domain::{RefillMode, SchemaVersion};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use futures_executor::block_on;

    #[test]
    fn test_first_boot_writes_default() {
        block_on(async {
            let mut store = SettingsStore::new(MemoryBlobStore::<4>::new());

            let loaded = store.load_or_default(SystemSettings::DEFAULT).await;
            assert_eq!(loaded, SystemSettings::DEFAULT);
            assert!(store.store().contains(SETTINGS_KEY));

            // Subsequent loads hit the stored record
            assert_eq!(store.load::<SystemSettings>().await, Ok(SystemSettings::DEFAULT));
        });
    }

    #[test]
    fn test_stored_record_wins_over_default() {
        block_on(async {
            let mut store = SettingsStore::new(MemoryBlobStore::<4>::new());
            let custom = SystemSettings {
                auto_ph_control: true,
                refill_mode: RefillMode::Circulate,
                ..SystemSettings::DEFAULT
            };
            store.save(&custom).await.unwrap();

            assert_eq!(store.load_or_default(SystemSettings::DEFAULT).await, custom);
        });
    }

    #[test]
    fn test_corrupt_record_is_replaced() {
        block_on(async {
            let mut store = SettingsStore::new(MemoryBlobStore::<4>::new());
            store
                .store_mut()
                .set_blob(CALIBRATION_KEY, &[0xff, 0x01])
                .await
                .unwrap();

            assert!(store.load::<PhCalibration>().await.is_err());
            let loaded = store.load_or_default(PhCalibration::DEFAULT).await;
            assert_eq!(loaded, PhCalibration::DEFAULT);
            assert_eq!(store.load::<PhCalibration>().await, Ok(PhCalibration::DEFAULT));
        });
    }

    #[test]
    fn test_trailing_bytes_are_a_size_mismatch() {
        block_on(async {
            let mut store = SettingsStore::new(MemoryBlobStore::<4>::new());
            let mut buf = [0u8; RECORD_CAPACITY];
            let len = postcard::to_slice(&PhCalibration::DEFAULT, &mut buf).unwrap().len();
            store
                .store_mut()
                .set_blob(CALIBRATION_KEY, &buf[..len + 3])
                .await
                .unwrap();

            assert_eq!(store.load::<PhCalibration>().await, Err(LoadMiss::SizeMismatch));
        });
    }

    #[test]
    fn test_incompatible_major_version_is_rejected() {
        block_on(async {
            let mut store = SettingsStore::new(MemoryBlobStore::<4>::new());
            let future = SystemSettings {
                version: SchemaVersion::new(2, 0),
                ..SystemSettings::DEFAULT
            };
            store.save(&future).await.unwrap();

            assert_eq!(store.load::<SystemSettings>().await, Err(LoadMiss::Rejected));
            assert_eq!(
                store.save_settings(&future).await,
                Err(SettingsError::IncompatibleVersion { major: 2, minor: 0 })
            );
            assert_eq!(
                store.load_or_default(SystemSettings::DEFAULT).await,
                SystemSettings::DEFAULT
            );
        });
    }

    #[test]
    fn test_shared_record_swaps_whole_record() {
        let shared: SharedRecord<CriticalSectionRawMutex, _> = SharedRecord::new(SystemSettings::DEFAULT);
        let update = SystemSettings {
            ph_dose_ms: 2_500,
            ..SystemSettings::DEFAULT
        };

        let previous = shared.replace(update);
        assert_eq!(previous, SystemSettings::DEFAULT);
        assert_eq!(shared.get(), update);
    }
}
