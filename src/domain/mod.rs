//! Domain layer - pure business logic independent of infrastructure
//!
//! Readings, calibration and settings records. Nothing in here knows
//! about buses, queues or the network.

pub mod calibration;
pub mod reading;
pub mod settings;

pub use calibration::{AdcGain, LinearCalibration, PhCalibration};
pub use reading::{
    AnalogChannel, AnalogSample, EnvironmentalSample, RawValue, SensorId, SensorReading,
};
pub use settings::{RefillMode, SchemaVersion, SystemSettings};
