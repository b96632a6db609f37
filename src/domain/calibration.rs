//! Calibration domain services
//!
//! Converts raw analog-to-digital readings into volts, and volts into
//! engineering units (pH, total dissolved solids).

use serde::{Deserialize, Serialize};

/// Linear calibration: `value = volts * scale + offset`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinearCalibration {
    /// Units per volt
    pub scale: f32,
    /// Value at zero volts
    pub offset: f32,
}

impl LinearCalibration {
    /// Create a new calibration with custom parameters
    pub const fn new(scale: f32, offset: f32) -> Self {
        Self { scale, offset }
    }

    /// Apply the calibration to a voltage
    #[inline]
    pub fn apply(&self, volts: f32) -> f32 {
        volts * self.scale + self.offset
    }

    /// Create calibration from two known `(volts, value)` points
    ///
    /// Returns `None` when the points do not define a line (same voltage,
    /// or a non-finite input).
    pub fn from_two_points(volts1: f32, value1: f32, volts2: f32, value2: f32) -> Option<Self> {
        let span = volts2 - volts1;
        if !span.is_finite() || span == 0.0 {
            return None;
        }

        let scale = (value2 - value1) / span;
        let offset = value1 - scale * volts1;

        if scale.is_finite() && offset.is_finite() {
            Some(Self { scale, offset })
        } else {
            None
        }
    }
}

/// pH probe calibration record
///
/// Stores the probe voltage measured in the pH 7, pH 4 and pH 10 buffer
/// solutions. The conversion line is taken through the pH 7 and pH 4
/// points; the pH 10 point is persisted for the operator but not applied.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhCalibration {
    /// Probe voltage in pH 7 buffer
    pub ph7_volts: f32,
    /// Probe voltage in pH 4 buffer
    pub ph4_volts: f32,
    /// Probe voltage in pH 10 buffer
    pub ph10_volts: f32,
}

impl PhCalibration {
    /// Factory calibration
    ///
    /// Points chosen so the resulting line is exactly `pH = volts * 4.0`.
    pub const DEFAULT: Self = Self {
        ph7_volts: 1.75,
        ph4_volts: 1.00,
        ph10_volts: 2.50,
    };

    /// Line used when the stored points are degenerate
    pub const FALLBACK_LINE: LinearCalibration = LinearCalibration::new(4.0, 0.0);

    pub const fn new(ph7_volts: f32, ph4_volts: f32, ph10_volts: f32) -> Self {
        Self {
            ph7_volts,
            ph4_volts,
            ph10_volts,
        }
    }

    /// Linear conversion from probe volts to pH
    pub fn line(&self) -> LinearCalibration {
        LinearCalibration::from_two_points(self.ph7_volts, 7.0, self.ph4_volts, 4.0)
            .unwrap_or(Self::FALLBACK_LINE)
    }

    /// Convert a probe voltage to pH
    pub fn ph_from_volts(&self, volts: f32) -> f32 {
        self.line().apply(volts)
    }
}

impl Default for PhCalibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Programmable gain of the analog front end, named by full-scale range
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcGain {
    /// ±6.144 V
    TwoThirds,
    /// ±4.096 V
    #[default]
    One,
    /// ±2.048 V
    Two,
    /// ±1.024 V
    Four,
    /// ±0.512 V
    Eight,
    /// ±0.256 V
    Sixteen,
}

impl AdcGain {
    /// Full-scale range in volts
    pub const fn full_scale_volts(self) -> f32 {
        match self {
            AdcGain::TwoThirds => 6.144,
            AdcGain::One => 4.096,
            AdcGain::Two => 2.048,
            AdcGain::Four => 1.024,
            AdcGain::Eight => 0.512,
            AdcGain::Sixteen => 0.256,
        }
    }

    /// Convert a signed 16-bit conversion result to volts
    #[inline]
    pub fn volts(self, raw: i16) -> f32 {
        raw as f32 * self.full_scale_volts() / 32768.0
    }
}
