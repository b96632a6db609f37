//! Monotonic clock adapter with a wall-clock offset
//!
//! Implements the Clock port on top of `embassy_time::Instant`. Until time
//! synchronisation completes the clock reports seconds since boot.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_time::Instant;
use log::info;

use crate::ports::clock::Clock;

/// Uptime clock corrected by the last synchronised wall-clock time
pub struct SyncedClock<M: RawMutex> {
    /// Unix seconds at boot, once known
    boot_epoch: BlockingMutex<M, Cell<Option<i64>>>,
}

impl<M: RawMutex> SyncedClock<M> {
    pub const fn new() -> Self {
        Self {
            boot_epoch: BlockingMutex::new(Cell::new(None)),
        }
    }

    /// Record that the current unix time is `unix_secs`
    pub fn set_unix_time(&self, unix_secs: i64) {
        let boot_epoch = unix_secs - Self::uptime_secs();
        self.boot_epoch.lock(|cell| cell.set(Some(boot_epoch)));
        info!("clock synchronised, boot epoch {}", boot_epoch);
    }

    pub fn is_synchronised(&self) -> bool {
        self.boot_epoch.lock(|cell| cell.get().is_some())
    }

    fn uptime_secs() -> i64 {
        Instant::now().as_secs() as i64
    }
}

impl<M: RawMutex> Default for SyncedClock<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> Clock for SyncedClock<M> {
    fn now(&self) -> i64 {
        let boot_epoch = self.boot_epoch.lock(|cell| cell.get()).unwrap_or(0);
        boot_epoch + Self::uptime_secs()
    }
}
