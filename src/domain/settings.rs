//! System settings record
//!
//! Versioned configuration persisted across power cycles.

use serde::{Deserialize, Serialize};

/// Schema version of a persisted record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchemaVersion {
    pub major: u8,
    pub minor: u8,
}

impl SchemaVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Records are interchangeable within one major version
    pub const fn is_compatible_with(&self, other: &SchemaVersion) -> bool {
        self.major == other.major
    }
}

/// Reservoir refill behaviour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RefillMode {
    #[default]
    Off,
    On,
    Circulate,
}

/// Device configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemSettings {
    pub version: SchemaVersion,
    /// Automatic pH correction enabled
    pub auto_ph_control: bool,
    pub refill_mode: RefillMode,
    /// Seconds to wait for the solution to settle after a pH dose
    pub ph_stabilization_interval_s: u32,
    /// pH dosing pump on-time in milliseconds
    pub ph_dose_ms: u32,
    /// Refill pump on-time in milliseconds
    pub refill_dose_ms: u32,
}

impl SystemSettings {
    /// Schema version compiled into this firmware
    pub const CURRENT_VERSION: SchemaVersion = SchemaVersion::new(1, 0);

    /// Compiled-in defaults, written on first boot
    pub const DEFAULT: Self = Self {
        version: Self::CURRENT_VERSION,
        auto_ph_control: false,
        refill_mode: RefillMode::Off,
        ph_stabilization_interval_s: 15 * 60,
        ph_dose_ms: 1_000,
        refill_dose_ms: 5_000,
    };

    /// Whether this record can be used by the running firmware
    pub const fn is_current_schema(&self) -> bool {
        self.version.is_compatible_with(&Self::CURRENT_VERSION)
    }
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}
