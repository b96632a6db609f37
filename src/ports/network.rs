//! Network ports - link management, the HTTP responder and time sync
//!
//! The network stack itself is outside this crate. The connectivity state
//! machine drives it through these traits, which are called from the link
//! event handler and therefore synchronous.

/// Error type for network operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkError {
    /// The link driver refused the connect request
    #[error("connect request rejected")]
    ConnectRejected,
    /// The responder could not bind or allocate its sockets
    #[error("responder failed to start")]
    ResponderStart,
}

/// Port for the station-mode link (association with the access point)
pub trait LinkControl {
    /// Issue one connect attempt
    ///
    /// Completion is reported asynchronously as a link event.
    fn connect(&mut self) -> Result<(), NetworkError>;
}

/// Port for the network responder lifecycle
///
/// Implementations must report liveness truthfully; the state machine uses
/// `is_running` to make start and stop idempotent.
pub trait NetworkResponder {
    fn is_running(&self) -> bool;

    fn start(&mut self) -> Result<(), NetworkError>;

    fn stop(&mut self);
}

/// Port for wall-clock synchronisation (SNTP or similar)
pub trait TimeSync {
    /// Kick off synchronisation; completion is not awaited
    fn start_sync(&mut self);
}
