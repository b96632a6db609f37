//! Command/response channel between the two execution contexts
//!
//! Two capacity-1 queues, one per direction, plus a single request slot.
//! At most one request is outstanding at a time: a second request while
//! the first is unanswered is rejected as `Busy` rather than queued.
//!
//! Every command carries a `RequestId` that the response echoes. The
//! requester holds the slot through a `Ticket`; the slot is released when
//! the ticket is consumed by `await_response` or dropped. Responses that do
//! not belong to the current ticket are discarded, so a late answer to an
//! abandoned request never reaches a later caller.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_deadline, with_timeout, Duration, Instant};
use log::{debug, error, warn};

use crate::protocol::{CommandTag, Envelope, RequestId, SystemCommand, SystemResponse};

/// Error type for channel operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// A request is already outstanding or the command could not be enqueued
    #[error("channel busy")]
    Busy,
    /// No response arrived within the timeout
    #[error("timed out waiting for response")]
    Timeout,
    /// The response does not answer the command that was sent
    #[error("response tag mismatch: expected {expected:?}, got {got:?}")]
    Mismatch { expected: CommandTag, got: CommandTag },
    /// The response queue stayed full for the whole send timeout
    #[error("response queue full")]
    ResponseQueueFull,
    /// The requester gave up before the response was ready
    #[error("request abandoned")]
    Abandoned,
}

#[derive(Clone, Copy)]
struct Slot {
    next_id: u32,
    outstanding: Option<RequestId>,
}

/// The pair of capacity-1 queues and the request slot
pub struct CommandChannel<M: RawMutex> {
    commands: Channel<M, Envelope<SystemCommand>, 1>,
    responses: Channel<M, Envelope<SystemResponse>, 1>,
    slot: BlockingMutex<M, Cell<Slot>>,
}

impl<M: RawMutex> CommandChannel<M> {
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            responses: Channel::new(),
            slot: BlockingMutex::new(Cell::new(Slot {
                next_id: 1,
                outstanding: None,
            })),
        }
    }

    /// Handle for the network-facing context
    pub fn requester(&self) -> Requester<'_, M> {
        Requester { channel: self }
    }

    /// Handle for the control loop
    pub fn control_end(&self) -> ControlEnd<'_, M> {
        ControlEnd { channel: self }
    }

    /// `true` when no request is outstanding
    pub fn is_idle(&self) -> bool {
        self.slot.lock(|slot| slot.get().outstanding.is_none())
    }

    fn claim(&self) -> Option<RequestId> {
        self.slot.lock(|cell| {
            let mut slot = cell.get();
            if slot.outstanding.is_some() {
                return None;
            }
            let id = RequestId(slot.next_id);
            slot.next_id = slot.next_id.wrapping_add(1);
            slot.outstanding = Some(id);
            cell.set(slot);
            Some(id)
        })
    }

    fn release(&self, id: RequestId) {
        self.slot.lock(|cell| {
            let mut slot = cell.get();
            if slot.outstanding == Some(id) {
                slot.outstanding = None;
                cell.set(slot);
            }
        })
    }

    fn is_outstanding(&self, id: RequestId) -> bool {
        self.slot.lock(|slot| slot.get().outstanding == Some(id))
    }

    /// Drop commands and responses left over from abandoned requests
    fn discard_stale(&self) -> usize {
        let mut dropped = 0;
        while self.commands.try_receive().is_ok() {
            dropped += 1;
        }
        while self.responses.try_receive().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
impl<M: RawMutex> CommandChannel<M> {
    /// Occupy the response queue with an answer nobody is waiting for
    pub(crate) fn park_foreign_response(&self, response: SystemResponse) {
        let _ = self
            .responses
            .try_send(Envelope::new(RequestId(u32::MAX), response));
    }
}

impl<M: RawMutex> Default for CommandChannel<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Network-facing end of the channel
pub struct Requester<'a, M: RawMutex> {
    channel: &'a CommandChannel<M>,
}

impl<M: RawMutex> Clone for Requester<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex> Copy for Requester<'_, M> {}

impl<'a, M: RawMutex> Requester<'a, M> {
    /// Claim the request slot and enqueue `command`
    ///
    /// Fails with `Busy` if another request is outstanding or the command
    /// cannot be enqueued within `timeout`.
    pub async fn send_command(
        &self,
        command: SystemCommand,
        timeout: Duration,
    ) -> Result<Ticket<'a, M>, ChannelError> {
        let id = self.channel.claim().ok_or(ChannelError::Busy)?;
        let ticket = Ticket {
            channel: self.channel,
            id,
            tag: command.tag(),
        };

        let dropped = self.channel.discard_stale();
        if dropped > 0 {
            debug!("request #{}: discarded {} stale message(s)", id.0, dropped);
        }

        with_timeout(timeout, self.channel.commands.send(Envelope::new(id, command)))
            .await
            .map_err(|_| ChannelError::Busy)?;

        Ok(ticket)
    }

    /// Send `command` and wait for its response
    pub async fn request(
        &self,
        command: SystemCommand,
        send_timeout: Duration,
        wait_timeout: Duration,
    ) -> Result<SystemResponse, ChannelError> {
        let ticket = self.send_command(command, send_timeout).await?;
        ticket.await_response(wait_timeout).await
    }
}

/// Claim on the single outstanding request
///
/// Dropping the ticket abandons the request and frees the slot.
#[must_use = "dropping a ticket abandons the request"]
pub struct Ticket<'a, M: RawMutex> {
    channel: &'a CommandChannel<M>,
    id: RequestId,
    tag: CommandTag,
}

impl<M: RawMutex> Ticket<'_, M> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn tag(&self) -> CommandTag {
        self.tag
    }

    /// Wait up to `timeout` for the response to this request
    ///
    /// Responses belonging to other requests are discarded. The slot is
    /// released whatever the outcome.
    pub async fn await_response(self, timeout: Duration) -> Result<SystemResponse, ChannelError> {
        // `None` when the timeout runs past the end of the clock: wait without bound
        let deadline = Instant::now().checked_add(timeout);

        loop {
            let received = match deadline {
                Some(deadline) => with_deadline(deadline, self.channel.responses.receive())
                    .await
                    .ok(),
                None => Some(self.channel.responses.receive().await),
            };

            match received {
                Some(envelope) if envelope.id == self.id => {
                    let got = envelope.payload.tag();
                    if got != self.tag {
                        error!(
                            "request #{}: expected {} response, got {}",
                            self.id.0,
                            self.tag.as_str(),
                            got.as_str()
                        );
                        return Err(ChannelError::Mismatch {
                            expected: self.tag,
                            got,
                        });
                    }
                    return Ok(envelope.payload);
                }
                Some(envelope) => {
                    warn!(
                        "request #{}: discarding stale response #{}",
                        self.id.0, envelope.id.0
                    );
                }
                None => {
                    warn!(
                        "request #{}: no response within {} ms",
                        self.id.0,
                        timeout.as_millis()
                    );
                    return Err(ChannelError::Timeout);
                }
            }
        }
    }
}

impl<M: RawMutex> Drop for Ticket<'_, M> {
    fn drop(&mut self) {
        self.channel.release(self.id);
    }
}

/// Control-loop end of the channel
pub struct ControlEnd<'a, M: RawMutex> {
    channel: &'a CommandChannel<M>,
}

impl<M: RawMutex> Clone for ControlEnd<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: RawMutex> Copy for ControlEnd<'_, M> {}

impl<M: RawMutex> ControlEnd<'_, M> {
    /// Wait up to `timeout` for the next command
    pub async fn receive_command(&self, timeout: Duration) -> Option<Envelope<SystemCommand>> {
        with_timeout(timeout, self.channel.commands.receive())
            .await
            .ok()
    }

    /// Take a pending command without waiting
    pub fn try_receive_command(&self) -> Option<Envelope<SystemCommand>> {
        self.channel.commands.try_receive().ok()
    }

    /// Deposit the response for request `id`
    ///
    /// Responses to abandoned requests are not enqueued.
    pub async fn send_response(
        &self,
        id: RequestId,
        response: SystemResponse,
        timeout: Duration,
    ) -> Result<(), ChannelError> {
        if !self.channel.is_outstanding(id) {
            return Err(ChannelError::Abandoned);
        }

        with_timeout(timeout, self.channel.responses.send(Envelope::new(id, response)))
            .await
            .map_err(|_| ChannelError::ResponseQueueFull)
    }
}
