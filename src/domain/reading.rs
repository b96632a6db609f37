//! Sensor reading domain entities
//!
//! A `SensorReading` is produced fresh for every reading request and is
//! never cached. The raw samples it is built from are also defined here.

use serde::{Deserialize, Serialize};

use crate::domain::calibration::{LinearCalibration, PhCalibration};

/// A complete reading, as served to the network.
///
/// Field names on the wire are `time`, `ph`, `tds`, `temp`, `humidity`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReading {
    /// Unix time in seconds (uptime seconds until the clock is synchronised)
    pub time: i64,
    /// pH derived from analog channel 0
    pub ph: f32,
    /// Total dissolved solids (ppm) derived from analog channel 1
    pub tds: f32,
    /// Temperature in Celsius
    #[serde(rename = "temp")]
    pub temperature_c: f32,
    /// Relative humidity in percent
    pub humidity: f32,
}

impl SensorReading {
    /// Assemble a reading from the three raw samples of one reading cycle.
    pub fn from_samples(
        time: i64,
        ph_sample: AnalogSample,
        tds_sample: AnalogSample,
        environment: EnvironmentalSample,
        ph_calibration: &PhCalibration,
        tds_calibration: &LinearCalibration,
    ) -> Self {
        Self {
            time,
            ph: ph_calibration.ph_from_volts(ph_sample.volts),
            tds: tds_calibration.apply(tds_sample.volts),
            temperature_c: environment.temperature_c,
            humidity: environment.humidity,
        }
    }
}

/// Identifier of a physical input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorId {
    /// pH probe on analog channel 0
    PhProbe,
    /// Conductivity (TDS) probe on analog channel 1
    TdsProbe,
    /// Combined temperature / pressure / humidity sensor
    Environment,
}

impl SensorId {
    /// Get the string representation of this sensor ID
    pub const fn as_str(&self) -> &'static str {
        match self {
            SensorId::PhProbe => "ph_probe",
            SensorId::TdsProbe => "tds_probe",
            SensorId::Environment => "environment",
        }
    }

    /// Analog input the sensor is wired to, if it is an analog sensor
    pub const fn analog_channel(&self) -> Option<AnalogChannel> {
        match self {
            SensorId::PhProbe => Some(AnalogChannel::CH0),
            SensorId::TdsProbe => Some(AnalogChannel::CH1),
            SensorId::Environment => None,
        }
    }
}

/// Single-ended analog input of the converter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogChannel(u8);

impl AnalogChannel {
    pub const CH0: AnalogChannel = AnalogChannel(0);
    pub const CH1: AnalogChannel = AnalogChannel(1);
    pub const CH2: AnalogChannel = AnalogChannel(2);
    pub const CH3: AnalogChannel = AnalogChannel(3);

    /// Create a channel from its index (0..=3)
    pub const fn new(index: u8) -> Option<Self> {
        if index < 4 {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Get the channel index
    pub const fn index(&self) -> u8 {
        self.0
    }
}

/// One analog conversion
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogSample {
    pub channel: AnalogChannel,
    /// Signed conversion result
    pub raw: i16,
    /// Result scaled by the converter gain
    pub volts: f32,
}

/// One environmental sensor measurement
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvironmentalSample {
    pub temperature_c: f32,
    /// Pressure in hPa (not part of the served reading)
    pub pressure_hpa: f32,
    pub humidity: f32,
}

/// Raw value returned by a guarded acquisition
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RawValue {
    Analog(AnalogSample),
    Environmental(EnvironmentalSample),
}
