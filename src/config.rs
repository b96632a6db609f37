//! Controller configuration
//!
//! Timing bounds, retry limits, conversion scales and storage keys.

use embassy_time::Duration;

use crate::domain::LinearCalibration;

/// Namespace holding all persisted records
pub const STORAGE_NAMESPACE: &str = "storage";

/// Key of the `SystemSettings` record
pub const SETTINGS_KEY: &str = "sys_settings";

/// Key of the `PhCalibration` record
pub const CALIBRATION_KEY: &str = "ph_cal";

/// Worst-case analog conversion time (128 samples/s)
pub const ANALOG_CONVERSION_WINDOW: Duration = Duration::from_millis(8);

/// Worst-case environmental sensor measurement time
pub const ENVIRONMENT_CONVERSION_WINDOW: Duration = Duration::from_millis(5);

/// Timeouts used by the guards, the channel and the control loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    /// Bound on acquiring the analog converter guard
    pub analog_guard_timeout: Duration,
    /// Bound on acquiring the environmental sensor guard
    pub environment_guard_timeout: Duration,
    /// Bound on a single conversion once the guard is held
    pub conversion_timeout: Duration,
    /// Delay between busy polls of the converter
    pub conversion_poll_step: Duration,
    /// How long the control loop waits for a command per iteration
    pub command_poll_interval: Duration,
    /// How long the control loop may block depositing a response
    pub response_send_timeout: Duration,
    /// How long the network edge may block enqueuing a command
    pub request_send_timeout: Duration,
    /// How long the network edge waits for the paired response
    pub response_wait_timeout: Duration,
}

impl TimingConfig {
    /// Production timing
    pub const fn standard() -> Self {
        Self {
            analog_guard_timeout: Duration::from_millis(2 * ANALOG_CONVERSION_WINDOW.as_millis()),
            environment_guard_timeout: Duration::from_millis(
                2 * ENVIRONMENT_CONVERSION_WINDOW.as_millis(),
            ),
            conversion_timeout: Duration::from_millis(2 * ANALOG_CONVERSION_WINDOW.as_millis()),
            conversion_poll_step: Duration::from_millis(1),
            command_poll_interval: Duration::from_millis(20),
            response_send_timeout: Duration::from_millis(10),
            request_send_timeout: Duration::from_millis(50),
            response_wait_timeout: Duration::from_millis(500),
        }
    }

    /// Generous timing for slow buses or debug builds
    pub const fn relaxed() -> Self {
        Self {
            analog_guard_timeout: Duration::from_millis(100),
            environment_guard_timeout: Duration::from_millis(100),
            conversion_timeout: Duration::from_millis(100),
            conversion_poll_step: Duration::from_millis(2),
            command_poll_interval: Duration::from_millis(50),
            response_send_timeout: Duration::from_millis(50),
            request_send_timeout: Duration::from_millis(200),
            response_wait_timeout: Duration::from_secs(2),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Link retry policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectivityConfig {
    /// Consecutive disconnects tolerated before giving up
    pub max_retries: u8,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self { max_retries: 10 }
    }
}

/// Engineering-unit conversion of the TDS channel
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConversionConfig {
    /// ppm per volt on analog channel 1
    pub tds: LinearCalibration,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            tds: LinearCalibration::new(1000.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_timeouts_are_twice_the_window() {
        let timing = TimingConfig::standard();
        assert_eq!(timing.analog_guard_timeout, Duration::from_millis(16));
        assert_eq!(timing.environment_guard_timeout, Duration::from_millis(10));
    }
}
