//! Sensor ports - abstractions over the transducer drivers
//!
//! The core never talks to a bus directly. It drives these traits while
//! holding the matching hardware guard, so an implementation may assume it
//! is never entered concurrently.

use crate::domain::{AdcGain, AnalogChannel, EnvironmentalSample};

/// Error type for driver operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Bus transaction failed
    #[error("bus transaction failed")]
    Bus,
    /// Sensor not initialized
    #[error("sensor not initialized")]
    NotInitialized,
    /// Sensor returned invalid data
    #[error("sensor returned invalid data")]
    InvalidData,
    /// Conversion did not complete in time
    #[error("conversion did not complete in time")]
    ConversionTimeout,
}

/// Port for a multiplexed analog-to-digital converter
///
/// A conversion is a three-step sequence: select the input and start,
/// poll until the converter is idle, read the result. Channel selection is
/// part of the converter state and is not assumed to survive between
/// independent acquisitions.
///
/// # Example Implementation
///
/// ```ignore
/// impl<I: I2c> AnalogFrontend for Ads1115<I> {
///     async fn begin_conversion(&mut self, channel: AnalogChannel) -> Result<(), SensorError> {
///         let config = self.config_word(channel);
///         self.write_register(CONFIG, config).await
///     }
///     // ...
/// }
/// ```
pub trait AnalogFrontend {
    /// Select `channel` and trigger a single conversion
    fn begin_conversion(
        &mut self,
        channel: AnalogChannel,
    ) -> impl core::future::Future<Output = Result<(), SensorError>>;

    /// `true` while a conversion is in progress
    fn poll_busy(&mut self) -> impl core::future::Future<Output = Result<bool, SensorError>>;

    /// Read the result of the last conversion
    fn read_raw(&mut self) -> impl core::future::Future<Output = Result<i16, SensorError>>;

    /// Gain the converter is configured for
    fn gain(&self) -> AdcGain;
}

/// Port for the combined temperature / pressure / humidity sensor
pub trait EnvironmentalSensor {
    /// Take one complete measurement
    fn read_environmental(
        &mut self,
    ) -> impl core::future::Future<Output = Result<EnvironmentalSample, SensorError>>;
}
