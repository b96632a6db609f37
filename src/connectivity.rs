//! Connectivity state machine
//!
//! Tracks the station link and keeps the network responder running exactly
//! while an address is assigned. Disconnects are retried up to
//! `ConnectivityConfig::max_retries` times; after that the machine parks in
//! `Failed` and ignores further events until `reset` is called.
//!
//! ```text
//!  Disconnected --StationStarted--> Connecting
//!  Connecting --Disconnected (n < max)--> Connecting   (retry)
//!  Connecting --Disconnected (n = max)--> Failed
//!  Disconnected/Connecting --AddressAssigned--> Connected   (retries = 0)
//!  Connected --Disconnected--> Disconnected   (responder stopped)
//! ```

use core::net::Ipv4Addr;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, Receiver};
use log::{debug, error, info, warn};

use crate::config::ConnectivityConfig;
use crate::ports::network::{LinkControl, NetworkResponder, TimeSync};

/// Link state as seen by the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectivityState {
    /// No association and no attempt in flight
    Disconnected,
    /// Connect attempt issued, waiting for an address
    Connecting,
    /// Address assigned; the responder is running
    Connected,
    /// Retries exhausted; terminal until reset
    Failed,
}

/// Signals raised by the link driver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// The station interface came up
    StationStarted,
    /// Association lost or a connect attempt failed
    Disconnected,
    /// DHCP assigned an address (logged only)
    AddressAssigned(Ipv4Addr),
}

/// Queue carrying link events from the driver callback to the state machine
pub type LinkEventChannel<M, const N: usize> = Channel<M, LinkEvent, N>;

/// State machine owning the responder lifecycle
pub struct ConnectivityMachine<L, R, T> {
    link: L,
    responder: R,
    time_sync: T,
    config: ConnectivityConfig,
    state: ConnectivityState,
    retries: u8,
    time_synced: bool,
}

impl<L, R, T> ConnectivityMachine<L, R, T>
where
    L: LinkControl,
    R: NetworkResponder,
    T: TimeSync,
{
    pub fn new(link: L, responder: R, time_sync: T, config: ConnectivityConfig) -> Self {
        Self {
            link,
            responder,
            time_sync,
            config,
            state: ConnectivityState::Disconnected,
            retries: 0,
            time_synced: false,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Consecutive disconnects since the last address assignment
    pub fn retries(&self) -> u8 {
        self.retries
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    /// Feed one link event and return the resulting state
    pub fn handle(&mut self, event: LinkEvent) -> ConnectivityState {
        use ConnectivityState::*;

        let next = match (self.state, event) {
            (Failed, event) => {
                debug!("link failed, ignoring {:?}", event);
                Failed
            }
            (Disconnected | Connecting, LinkEvent::StationStarted) => {
                self.connect();
                Connecting
            }
            (Connected, LinkEvent::StationStarted) => Connected,
            (Disconnected | Connecting, LinkEvent::Disconnected) => self.retry(),
            (Connected, LinkEvent::Disconnected) => {
                warn!("link lost");
                self.stop_responder();
                self.connect();
                Disconnected
            }
            (_, LinkEvent::AddressAssigned(address)) => {
                info!("got address {}", address);
                self.retries = 0;
                self.sync_time_once();
                self.start_responder();
                Connected
            }
        };

        if next != self.state {
            debug!("link state {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        next
    }

    /// Leave `Failed` and start over from `Disconnected`
    pub fn reset(&mut self) {
        info!("link state reset");
        self.state = ConnectivityState::Disconnected;
        self.retries = 0;
    }

    /// Block until the first address assignment (or until retries run out)
    ///
    /// There is no timeout: the device cannot do anything useful before it
    /// has joined the network once.
    pub async fn wait_for_association<M: RawMutex, const N: usize>(
        &mut self,
        events: Receiver<'_, M, LinkEvent, N>,
    ) -> ConnectivityState {
        loop {
            match self.handle(events.receive().await) {
                state @ (ConnectivityState::Connected | ConnectivityState::Failed) => return state,
                _ => {}
            }
        }
    }

    /// Process link events forever
    pub async fn run<M: RawMutex, const N: usize>(
        &mut self,
        events: Receiver<'_, M, LinkEvent, N>,
    ) -> ! {
        loop {
            self.handle(events.receive().await);
        }
    }

    fn retry(&mut self) -> ConnectivityState {
        self.retries = self.retries.saturating_add(1);
        if self.retries >= self.config.max_retries {
            error!("link: giving up after {} attempts", self.retries);
            self.stop_responder();
            return ConnectivityState::Failed;
        }

        info!("link: retry {}/{}", self.retries, self.config.max_retries);
        self.connect();
        ConnectivityState::Connecting
    }

    fn connect(&mut self) {
        if let Err(e) = self.link.connect() {
            warn!("link: {}", e);
        }
    }

    fn sync_time_once(&mut self) {
        if !self.time_synced {
            self.time_sync.start_sync();
            self.time_synced = true;
        }
    }

    fn start_responder(&mut self) {
        if self.responder.is_running() {
            return;
        }
        match self.responder.start() {
            Ok(()) => info!("responder started"),
            Err(e) => error!("{}", e),
        }
    }

    fn stop_responder(&mut self) {
        if self.responder.is_running() {
            self.responder.stop();
            info!("responder stopped");
        }
    }
}
