//! Shared hardware guard
//!
//! Each physical transducer sits behind its own async mutex. A reading
//! operation holds the guard for exactly one conversion sequence and
//! releases it on every exit path (the guard is dropped, including on `?`).
//! Acquisition is bounded: a caller that cannot get the device within the
//! configured timeout gets `AcquireError::Timeout` instead of blocking.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{with_timeout, Duration, Timer};
use log::{debug, warn};

use crate::config::TimingConfig;
use crate::domain::{AnalogChannel, AnalogSample, EnvironmentalSample, RawValue, SensorId};
use crate::ports::sensor::{AnalogFrontend, EnvironmentalSensor, SensorError};

/// Error type for guarded acquisitions
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquireError {
    /// The guard was not released within the acquisition timeout
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    /// The driver failed during the conversion sequence
    #[error("driver fault: {0}")]
    Sensor(#[from] SensorError),
}

/// Exclusive-access wrapper around one physical device
pub struct HardwareGuard<M: RawMutex, T> {
    name: &'static str,
    device: Mutex<M, T>,
    timeout: Duration,
}

impl<M: RawMutex, T> HardwareGuard<M, T> {
    /// Wrap `device`; acquisitions wait at most `timeout`
    pub const fn new(name: &'static str, device: T, timeout: Duration) -> Self {
        Self {
            name,
            device: Mutex::new(device),
            timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire exclusive access, waiting at most the configured timeout
    pub async fn acquire(&self) -> Result<MutexGuard<'_, M, T>, AcquireError> {
        with_timeout(self.timeout, self.device.lock())
            .await
            .map_err(|_| {
                warn!("{}: guard not acquired within {} ms", self.name, self.timeout.as_millis());
                AcquireError::Timeout(self.name)
            })
    }

    /// Consume the guard and return the device
    pub fn into_inner(self) -> T {
        self.device.into_inner()
    }
}

impl<M: RawMutex, A: AnalogFrontend> HardwareGuard<M, A> {
    /// Run one complete conversion on `channel`
    ///
    /// Selects the input, triggers, polls until idle (bounded by
    /// `conversion_timeout`) and reads the result, all under one guard.
    pub async fn read_channel(
        &self,
        channel: AnalogChannel,
        conversion_timeout: Duration,
        poll_step: Duration,
    ) -> Result<AnalogSample, AcquireError> {
        let mut adc = self.acquire().await?;

        adc.begin_conversion(channel).await?;

        let settled = with_timeout(conversion_timeout, async {
            while adc.poll_busy().await? {
                Timer::after(poll_step).await;
            }
            Ok::<(), SensorError>(())
        })
        .await;

        match settled {
            Ok(result) => result?,
            Err(_) => return Err(SensorError::ConversionTimeout.into()),
        }

        let raw = adc.read_raw().await?;
        let volts = adc.gain().volts(raw);
        debug!("{}: ch{} raw={} ({} V)", self.name, channel.index(), raw, volts);

        Ok(AnalogSample {
            channel,
            raw,
            volts,
        })
    }
}

impl<M: RawMutex, E: EnvironmentalSensor> HardwareGuard<M, E> {
    /// Take one environmental measurement under the guard
    pub async fn read_environment(&self) -> Result<EnvironmentalSample, AcquireError> {
        let mut sensor = self.acquire().await?;
        let sample = sensor.read_environmental().await?;
        Ok(sample)
    }
}

/// The two guarded transducers of the device
pub struct SensorBank<'a, M: RawMutex, A, E> {
    analog: &'a HardwareGuard<M, A>,
    environment: &'a HardwareGuard<M, E>,
    timing: TimingConfig,
}

impl<'a, M, A, E> SensorBank<'a, M, A, E>
where
    M: RawMutex,
    A: AnalogFrontend,
    E: EnvironmentalSensor,
{
    pub fn new(
        analog: &'a HardwareGuard<M, A>,
        environment: &'a HardwareGuard<M, E>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            analog,
            environment,
            timing,
        }
    }

    /// Acquire one raw reading from `sensor`
    pub async fn acquire_reading(&self, sensor: SensorId) -> Result<RawValue, AcquireError> {
        match sensor.analog_channel() {
            Some(channel) => self
                .analog
                .read_channel(
                    channel,
                    self.timing.conversion_timeout,
                    self.timing.conversion_poll_step,
                )
                .await
                .map(RawValue::Analog),
            None => self
                .environment
                .read_environment()
                .await
                .map(RawValue::Environmental),
        }
    }

    /// Analog channel of `sensor`, failing if it is not an analog sensor
    pub async fn acquire_analog(&self, sensor: SensorId) -> Result<AnalogSample, AcquireError> {
        match self.acquire_reading(sensor).await? {
            RawValue::Analog(sample) => Ok(sample),
            RawValue::Environmental(_) => Err(SensorError::InvalidData.into()),
        }
    }

    pub async fn acquire_environment(&self) -> Result<EnvironmentalSample, AcquireError> {
        match self.acquire_reading(SensorId::Environment).await? {
            RawValue::Environmental(sample) => Ok(sample),
            RawValue::Analog(_) => Err(SensorError::InvalidData.into()),
        }
    }
}
