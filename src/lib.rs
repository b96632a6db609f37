//! Hydroponics controller coordination library
//!
//! Cross-core coordination for a dual-core hydroponics controller: one
//! execution context faces the network, the other owns the sensors. They
//! talk only through a bounded command/response channel; each transducer
//! sits behind its own timeout-bounded guard.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Network edge                                │
//! │  - ReadingEndpoint: HTTP routes -> commands, responses -> JSON  │
//! │  - ConnectivityMachine: link state, responder lifecycle         │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │ CommandChannel (capacity 1 each way)
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Control loop                                │
//! │  - ControlLoop: poll, dispatch, respond                         │
//! │  - SensorBank / HardwareGuard: one guard per transducer         │
//! │  - SettingsStore / SharedRecord: persisted, copy-on-write       │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Ports & adapters                            │
//! │  - AnalogFrontend (Ads1115), EnvironmentalSensor                │
//! │  - BlobStore (MemoryBlobStore), Clock (SyncedClock)             │
//! │  - LinkControl, NetworkResponder, TimeSync                      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything is generic over `RawMutex`, so the same code runs with
//! `CriticalSectionRawMutex` across cores on target and on the host in tests.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
pub mod protocol;

/// Domain layer - pure business logic
pub mod domain;

/// Ports - traits defining boundaries
pub mod ports;

/// Adapters - concrete implementations
pub mod adapters;

pub mod channel;
pub mod connectivity;
pub mod control;
pub mod guard;
pub mod responder;
pub mod settings_store;

pub use channel::{ChannelError, CommandChannel, ControlEnd, Requester, Ticket};
pub use config::{ConnectivityConfig, ConversionConfig, TimingConfig};
pub use connectivity::{ConnectivityMachine, ConnectivityState, LinkEvent, LinkEventChannel};
pub use control::{ControlLoop, PollOutcome, SharedState};
pub use domain::{PhCalibration, SensorId, SensorReading, SystemSettings};
pub use guard::{AcquireError, HardwareGuard, SensorBank};
pub use protocol::{CommandTag, SystemCommand, SystemResponse};
pub use responder::{EndpointError, HttpReply, HttpRequest, ReadingEndpoint, StatusCode};
pub use settings_store::{SettingsError, SettingsStore, SharedRecord};

pub use ports::{
    AnalogFrontend, BlobStore, Clock, EnvironmentalSensor, LinkControl, NetworkResponder, TimeSync,
};

pub use adapters::{Ads1115, MemoryBlobStore, SyncedClock};
