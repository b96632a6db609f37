//! ADS1115 analog front end adapter
//!
//! This adapter implements the AnalogFrontend port for the TI ADS1115
//! 16-bit converter over any `embedded_hal_async` I2C bus. The pH and TDS
//! probes sit on single-ended inputs AIN0 and AIN1.
//!
//! Conversions run in single-shot mode at 128 samples/s (~8 ms each) with
//! the comparator disabled.

use embedded_hal_async::i2c::I2c;

use crate::domain::{AdcGain, AnalogChannel};
use crate::ports::sensor::{AnalogFrontend, SensorError};

/// Default I2C address (ADDR pin tied to GND)
pub const DEFAULT_ADDRESS: u8 = 0x48;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// OS bit: write 1 to start, reads 0 while converting
const CONFIG_OS: u16 = 1 << 15;
/// Single-ended mux base (AIN0 vs GND), channel index added on top
const CONFIG_MUX_SINGLE: u16 = 0b100 << 12;
const CONFIG_MODE_SINGLE_SHOT: u16 = 1 << 8;
/// 128 samples per second
const CONFIG_DR_128SPS: u16 = 0b100 << 5;
const CONFIG_COMP_DISABLE: u16 = 0b11;

/// ADS1115 adapter implementing AnalogFrontend
pub struct Ads1115<I: I2c> {
    i2c: I,
    address: u8,
    gain: AdcGain,
}

impl<I: I2c> Ads1115<I> {
    /// Create an adapter at the default address and ±4.096 V range
    pub fn new(i2c: I) -> Self {
        Self::with_config(i2c, DEFAULT_ADDRESS, AdcGain::One)
    }

    pub fn with_config(i2c: I, address: u8, gain: AdcGain) -> Self {
        Self { i2c, address, gain }
    }

    pub fn set_gain(&mut self, gain: AdcGain) {
        self.gain = gain;
    }

    /// Release the underlying I2C bus
    pub fn release(self) -> I {
        self.i2c
    }

    /// Config register value for a single-shot conversion on `channel`
    pub fn config_word(&self, channel: AnalogChannel) -> u16 {
        let pga: u16 = match self.gain {
            AdcGain::TwoThirds => 0b000,
            AdcGain::One => 0b001,
            AdcGain::Two => 0b010,
            AdcGain::Four => 0b011,
            AdcGain::Eight => 0b100,
            AdcGain::Sixteen => 0b101,
        };

        CONFIG_OS
            | CONFIG_MUX_SINGLE
            | (u16::from(channel.index()) << 12)
            | (pga << 9)
            | CONFIG_MODE_SINGLE_SHOT
            | CONFIG_DR_128SPS
            | CONFIG_COMP_DISABLE
    }

    async fn read_register(&mut self, register: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .await
            .map_err(|_| SensorError::Bus)?;
        Ok(u16::from_be_bytes(buf))
    }

    async fn write_register(&mut self, register: u8, value: u16) -> Result<(), SensorError> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[register, hi, lo])
            .await
            .map_err(|_| SensorError::Bus)
    }
}

impl<I: I2c> AnalogFrontend for Ads1115<I> {
    async fn begin_conversion(&mut self, channel: AnalogChannel) -> Result<(), SensorError> {
        let config = self.config_word(channel);
        self.write_register(REG_CONFIG, config).await
    }

    async fn poll_busy(&mut self) -> Result<bool, SensorError> {
        let config = self.read_register(REG_CONFIG).await?;
        Ok(config & CONFIG_OS == 0)
    }

    async fn read_raw(&mut self) -> Result<i16, SensorError> {
        let raw = self.read_register(REG_CONVERSION).await?;
        Ok(raw as i16)
    }

    fn gain(&self) -> AdcGain {
        self.gain
    }
}
