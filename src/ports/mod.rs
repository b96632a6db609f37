//! Ports (interfaces) defining the boundaries of the application
//!
//! Ports are traits that define how the core interacts with external
//! systems. They let the coordination logic run against fake transducers,
//! a RAM store and a fake clock in tests.
//!
//! - **AnalogFrontend / EnvironmentalSensor**: transducer drivers
//! - **BlobStore**: persistent key/blob storage
//! - **LinkControl / NetworkResponder / TimeSync**: network lifecycle
//! - **Clock**: reading timestamps

pub mod clock;
pub mod network;
pub mod sensor;
pub mod storage;

pub use clock::Clock;
pub use network::{LinkControl, NetworkError, NetworkResponder, TimeSync};
pub use sensor::{AnalogFrontend, EnvironmentalSensor, SensorError};
pub use storage::{BlobStore, StorageError};
