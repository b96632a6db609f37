//! Control loop
//!
//! Runs on the sensor-facing execution context. Each iteration waits a
//! short, fixed time for a command, dispatches it, and deposits the result
//! on the response queue. Nothing is cached: every reading request drives
//! a fresh conversion on each transducer.

use embassy_sync::blocking_mutex::raw::RawMutex;
use log::{debug, error, info, warn};

use crate::channel::{ChannelError, ControlEnd};
use crate::config::{ConversionConfig, TimingConfig};
use crate::domain::{
    AnalogSample, EnvironmentalSample, PhCalibration, SensorId, SensorReading, SystemSettings,
};
use crate::guard::{AcquireError, SensorBank};
use crate::ports::clock::Clock;
use crate::ports::sensor::{AnalogFrontend, EnvironmentalSensor};
use crate::ports::storage::BlobStore;
use crate::protocol::{CommandTag, SystemCommand, SystemResponse};
use crate::settings_store::{SettingsError, SettingsStore, SharedRecord};

/// What one loop iteration did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollOutcome {
    /// No command arrived within the poll interval
    Idle,
    /// A command was handled and its response deposited
    Replied(CommandTag),
    /// A command was handled but the response was dropped
    Dropped(CommandTag),
}

/// Shared records the control loop reads and updates
pub struct SharedState<'a, M: RawMutex> {
    pub settings: &'a SharedRecord<M, SystemSettings>,
    pub calibration: &'a SharedRecord<M, PhCalibration>,
}

/// The sensor-facing control loop
pub struct ControlLoop<'a, M, A, E, B, C>
where
    M: RawMutex,
    A: AnalogFrontend,
    E: EnvironmentalSensor,
    B: BlobStore,
    C: Clock,
{
    channel: ControlEnd<'a, M>,
    sensors: SensorBank<'a, M, A, E>,
    shared: SharedState<'a, M>,
    store: SettingsStore<B>,
    clock: C,
    timing: TimingConfig,
    conversion: ConversionConfig,
}

impl<'a, M, A, E, B, C> ControlLoop<'a, M, A, E, B, C>
where
    M: RawMutex,
    A: AnalogFrontend,
    E: EnvironmentalSensor,
    B: BlobStore,
    C: Clock,
{
    pub fn new(
        channel: ControlEnd<'a, M>,
        sensors: SensorBank<'a, M, A, E>,
        shared: SharedState<'a, M>,
        store: SettingsStore<B>,
        clock: C,
        timing: TimingConfig,
        conversion: ConversionConfig,
    ) -> Self {
        Self {
            channel,
            sensors,
            shared,
            store,
            clock,
            timing,
            conversion,
        }
    }

    /// Get the settings store (for inspection after updates)
    pub fn store(&self) -> &SettingsStore<B> {
        &self.store
    }

    pub fn into_store(self) -> SettingsStore<B> {
        self.store
    }

    /// Run forever
    pub async fn run(&mut self) -> ! {
        info!("control loop started");
        loop {
            self.poll_once().await;
        }
    }

    /// One iteration: wait up to the poll interval for a command and serve it
    pub async fn poll_once(&mut self) -> PollOutcome {
        let Some(envelope) = self
            .channel
            .receive_command(self.timing.command_poll_interval)
            .await
        else {
            return PollOutcome::Idle;
        };

        let tag = envelope.payload.tag();
        debug!("request #{}: {}", envelope.id.0, tag.as_str());

        let response = self.dispatch(envelope.payload).await;

        match self
            .channel
            .send_response(envelope.id, response, self.timing.response_send_timeout)
            .await
        {
            Ok(()) => PollOutcome::Replied(tag),
            Err(ChannelError::Abandoned) => {
                warn!("request #{}: requester gone, response dropped", envelope.id.0);
                PollOutcome::Dropped(tag)
            }
            Err(e) => {
                warn!("request #{}: {}, response dropped", envelope.id.0, e);
                PollOutcome::Dropped(tag)
            }
        }
    }

    async fn dispatch(&mut self, command: SystemCommand) -> SystemResponse {
        match command {
            SystemCommand::ReadingRequest => SystemResponse::Reading(self.take_reading().await),
            SystemCommand::SettingsUpdate(settings) => {
                SystemResponse::SettingsUpdate(self.apply_settings(settings).await)
            }
        }
    }

    /// Read pH, then TDS, then the environmental sensor
    pub async fn take_reading(&mut self) -> Result<SensorReading, AcquireError> {
        let (ph, tds, environment) = self.sample_all().await.map_err(|e| {
            error!("reading failed: {}", e);
            e
        })?;

        let reading = SensorReading::from_samples(
            self.clock.now(),
            ph,
            tds,
            environment,
            &self.shared.calibration.get(),
            &self.conversion.tds,
        );

        debug!(
            "pH {} tds {} temp {} humidity {}",
            reading.ph, reading.tds, reading.temperature_c, reading.humidity
        );
        Ok(reading)
    }

    async fn sample_all(
        &self,
    ) -> Result<(AnalogSample, AnalogSample, EnvironmentalSample), AcquireError> {
        let ph = self.sensors.acquire_analog(SensorId::PhProbe).await?;
        let tds = self.sensors.acquire_analog(SensorId::TdsProbe).await?;
        let environment = self.sensors.acquire_environment().await?;
        Ok((ph, tds, environment))
    }

    /// Persist `settings`, then swap it in as the live record
    pub async fn apply_settings(&mut self, settings: SystemSettings) -> Result<(), SettingsError> {
        match self.store.save_settings(&settings).await {
            Ok(()) => {
                self.shared.settings.replace(settings);
                info!("settings updated");
                Ok(())
            }
            Err(e) => {
                warn!("settings update rejected: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryBlobStore;
    use crate::channel::CommandChannel;
    use crate::domain::{AdcGain, AnalogChannel, EnvironmentalSample};
    use crate::guard::HardwareGuard;
    use crate::ports::sensor::SensorError;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_time::Duration;
    use futures_executor::block_on;

    type Mutex = CriticalSectionRawMutex;

    struct IdleAdc;

    impl AnalogFrontend for IdleAdc {
        async fn begin_conversion(&mut self, _channel: AnalogChannel) -> Result<(), SensorError> {
            Ok(())
        }

        async fn poll_busy(&mut self) -> Result<bool, SensorError> {
            Ok(false)
        }

        async fn read_raw(&mut self) -> Result<i16, SensorError> {
            Ok(14000)
        }

        fn gain(&self) -> AdcGain {
            AdcGain::One
        }
    }

    struct StillAir;

    impl EnvironmentalSensor for StillAir {
        async fn read_environmental(&mut self) -> Result<EnvironmentalSample, SensorError> {
            Ok(EnvironmentalSample::default())
        }
    }

    struct Epoch;

    impl Clock for Epoch {
        fn now(&self) -> i64 {
            0
        }
    }

    #[test]
    fn test_reading_dropped_when_response_queue_full() {
        let timing = TimingConfig::standard();
        let analog: HardwareGuard<Mutex, _> =
            HardwareGuard::new("adc", IdleAdc, timing.analog_guard_timeout);
        let environment: HardwareGuard<Mutex, _> =
            HardwareGuard::new("env", StillAir, timing.environment_guard_timeout);
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let calibration = SharedRecord::<Mutex, _>::new(PhCalibration::DEFAULT);

        let mut control = ControlLoop::new(
            channel.control_end(),
            SensorBank::new(&analog, &environment, timing),
            SharedState {
                settings: &settings,
                calibration: &calibration,
            },
            SettingsStore::new(MemoryBlobStore::<4>::new()),
            Epoch,
            timing,
            ConversionConfig::default(),
        );

        block_on(async {
            let ticket = channel
                .requester()
                .send_command(SystemCommand::ReadingRequest, Duration::from_millis(10))
                .await
                .unwrap();
            channel.park_foreign_response(SystemResponse::SettingsUpdate(Ok(())));

            assert_eq!(
                control.poll_once().await,
                PollOutcome::Dropped(CommandTag::ReadingRequest)
            );

            // The parked answer is discarded and the reading never arrives
            assert_eq!(
                ticket.await_response(Duration::from_millis(30)).await,
                Err(ChannelError::Timeout)
            );
        });
    }

    #[test]
    fn test_idle_without_command() {
        let timing = TimingConfig::standard();
        let analog: HardwareGuard<Mutex, _> =
            HardwareGuard::new("adc", IdleAdc, timing.analog_guard_timeout);
        let environment: HardwareGuard<Mutex, _> =
            HardwareGuard::new("env", StillAir, timing.environment_guard_timeout);
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let calibration = SharedRecord::<Mutex, _>::new(PhCalibration::DEFAULT);

        let mut control = ControlLoop::new(
            channel.control_end(),
            SensorBank::new(&analog, &environment, timing),
            SharedState {
                settings: &settings,
                calibration: &calibration,
            },
            SettingsStore::new(MemoryBlobStore::<4>::new()),
            Epoch,
            timing,
            ConversionConfig::default(),
        );

        assert_eq!(block_on(control.poll_once()), PollOutcome::Idle);
    }
}
