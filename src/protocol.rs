//! Cross-core message protocol
//!
//! Commands flow from the network-facing context to the control loop;
//! responses flow back. Both are closed tagged unions and every command
//! variant has exactly one matching response variant.

use crate::domain::{SensorReading, SystemSettings};
use crate::guard::AcquireError;
use crate::settings_store::SettingsError;

/// Command sent from the network edge to the control loop
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemCommand {
    /// Take a fresh reading of all sensors
    ReadingRequest,
    /// Validate, persist and apply a complete settings record
    SettingsUpdate(SystemSettings),
}

/// Response sent from the control loop back to the network edge
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemResponse {
    /// A freshly computed reading, or the fault that prevented it
    Reading(Result<SensorReading, AcquireError>),
    /// Whether the settings record was persisted and applied
    SettingsUpdate(Result<(), SettingsError>),
}

/// Variant tag shared by commands and responses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandTag {
    /// `SystemCommand::ReadingRequest` / `SystemResponse::Reading`
    ReadingRequest,
    /// `SystemCommand::SettingsUpdate` / `SystemResponse::SettingsUpdate`
    SettingsUpdate,
}

impl CommandTag {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CommandTag::ReadingRequest => "reading_request",
            CommandTag::SettingsUpdate => "settings_update",
        }
    }
}

impl SystemCommand {
    /// Create reading request command
    pub const fn reading_request() -> Self {
        Self::ReadingRequest
    }

    /// Create settings update command
    pub const fn settings_update(settings: SystemSettings) -> Self {
        Self::SettingsUpdate(settings)
    }

    pub const fn tag(&self) -> CommandTag {
        match self {
            SystemCommand::ReadingRequest => CommandTag::ReadingRequest,
            SystemCommand::SettingsUpdate(_) => CommandTag::SettingsUpdate,
        }
    }
}

impl SystemResponse {
    pub const fn tag(&self) -> CommandTag {
        match self {
            SystemResponse::Reading(_) => CommandTag::ReadingRequest,
            SystemResponse::SettingsUpdate(_) => CommandTag::SettingsUpdate,
        }
    }

    /// Whether this response answers `command`
    pub fn answers(&self, command: &SystemCommand) -> bool {
        self.tag() == command.tag()
    }
}

/// Identity of one request/response pair
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestId(pub u32);

/// A message tagged with the request it belongs to
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Envelope<T> {
    pub id: RequestId,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub const fn new(id: RequestId, payload: T) -> Self {
        Self { id, payload }
    }
}
