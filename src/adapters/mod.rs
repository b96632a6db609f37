//! Adapters - concrete implementations of ports
//!
//! Adapters connect the coordination core to the outside world by
//! implementing the port traits.
//!
//! # Available Adapters
//!
//! - **ads1115**: TI ADS1115 16-bit converter via async I2C
//! - **clock**: uptime clock with a synchronised wall-clock offset
//! - **memory_store**: RAM-backed blob store (host builds and tests)

pub mod ads1115;
pub mod clock;
pub mod memory_store;

pub use ads1115::Ads1115;
pub use clock::SyncedClock;
pub use memory_store::MemoryBlobStore;
