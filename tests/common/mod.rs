//! Test doubles shared by the integration tests

#![allow(dead_code)]

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use hydro_manager::domain::{AdcGain, AnalogChannel, EnvironmentalSample};
use hydro_manager::ports::{
    AnalogFrontend, BlobStore, Clock, EnvironmentalSensor, SensorError, StorageError,
};
use hydro_manager::{
    CommandChannel, ControlLoop, ConversionConfig, HardwareGuard, PhCalibration, ReadingEndpoint,
    SensorBank, SettingsStore, SharedRecord, SharedState, SystemSettings, TimingConfig,
};

pub type TestMutex = CriticalSectionRawMutex;

/// Converter returning a programmed raw value per channel
///
/// Every completed conversion adds `drift` to the channel's value, so two
/// readings are never identical unless a value was cached somewhere.
pub struct ScriptedAdc {
    pub raw: [i16; 4],
    pub drift: i16,
    pub selected: Option<AnalogChannel>,
    pub conversions: u32,
    pub fail_next: bool,
}

impl ScriptedAdc {
    pub fn new(ch0: i16, ch1: i16) -> Self {
        Self {
            raw: [ch0, ch1, 0, 0],
            drift: 0,
            selected: None,
            conversions: 0,
            fail_next: false,
        }
    }

    pub fn drifting(mut self, drift: i16) -> Self {
        self.drift = drift;
        self
    }
}

impl AnalogFrontend for ScriptedAdc {
    async fn begin_conversion(&mut self, channel: AnalogChannel) -> Result<(), SensorError> {
        self.selected = Some(channel);
        Ok(())
    }

    async fn poll_busy(&mut self) -> Result<bool, SensorError> {
        Ok(false)
    }

    async fn read_raw(&mut self) -> Result<i16, SensorError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(SensorError::Bus);
        }
        let channel = self.selected.ok_or(SensorError::NotInitialized)?;
        let slot = &mut self.raw[channel.index() as usize];
        let value = *slot;
        *slot = slot.saturating_add(self.drift);
        self.conversions += 1;
        Ok(value)
    }

    fn gain(&self) -> AdcGain {
        AdcGain::One
    }
}

/// Environmental sensor returning a fixed sample
pub struct FixedEnvironment {
    pub sample: EnvironmentalSample,
    pub reads: u32,
}

impl FixedEnvironment {
    pub fn new(temperature_c: f32, humidity: f32) -> Self {
        Self {
            sample: EnvironmentalSample {
                temperature_c,
                pressure_hpa: 1013.25,
                humidity,
            },
            reads: 0,
        }
    }
}

impl EnvironmentalSensor for FixedEnvironment {
    async fn read_environmental(&mut self) -> Result<EnvironmentalSample, SensorError> {
        self.reads += 1;
        Ok(self.sample)
    }
}

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// Store whose every operation fails with a backend error
#[derive(Default)]
pub struct BrokenStore {
    pub write_attempts: u32,
}

impl BlobStore for BrokenStore {
    async fn get_blob(&mut self, _key: &str, _buf: &mut [u8]) -> Result<usize, StorageError> {
        Err(StorageError::Backend)
    }

    async fn set_blob(&mut self, _key: &str, _data: &[u8]) -> Result<(), StorageError> {
        self.write_attempts += 1;
        Err(StorageError::Backend)
    }
}

pub fn approx(actual: f32, expected: f32) -> bool {
    (actual - expected).abs() < 0.01
}

pub const BOOT_TIME: i64 = 1_700_000_000;

/// Both execution contexts wired together over one channel
pub struct Rig {
    pub analog: HardwareGuard<TestMutex, ScriptedAdc>,
    pub environment: HardwareGuard<TestMutex, FixedEnvironment>,
    pub channel: CommandChannel<TestMutex>,
    pub settings: SharedRecord<TestMutex, SystemSettings>,
    pub calibration: SharedRecord<TestMutex, PhCalibration>,
    pub timing: TimingConfig,
}

impl Rig {
    pub fn new(adc: ScriptedAdc, environment: FixedEnvironment) -> Self {
        let timing = TimingConfig::standard();
        Self {
            analog: HardwareGuard::new("ads1115", adc, timing.analog_guard_timeout),
            environment: HardwareGuard::new(
                "environment",
                environment,
                timing.environment_guard_timeout,
            ),
            channel: CommandChannel::new(),
            settings: SharedRecord::new(SystemSettings::DEFAULT),
            calibration: SharedRecord::new(PhCalibration::DEFAULT),
            timing,
        }
    }

    pub fn control<B: BlobStore>(
        &self,
        store: SettingsStore<B>,
    ) -> ControlLoop<'_, TestMutex, ScriptedAdc, FixedEnvironment, B, FixedClock> {
        ControlLoop::new(
            self.channel.control_end(),
            SensorBank::new(&self.analog, &self.environment, self.timing),
            SharedState {
                settings: &self.settings,
                calibration: &self.calibration,
            },
            store,
            FixedClock(BOOT_TIME),
            self.timing,
            ConversionConfig::default(),
        )
    }

    pub fn endpoint(&self) -> ReadingEndpoint<'_, TestMutex> {
        ReadingEndpoint::new(self.channel.requester(), &self.settings, self.timing)
    }
}
