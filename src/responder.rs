//! Network edge
//!
//! Turns HTTP-shaped requests into channel commands and channel responses
//! into JSON replies. The socket handling lives with the network stack; this
//! module only sees a parsed request and a buffer to write the body into.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Duration;
use log::{debug, warn};
use serde::Serialize;

use crate::channel::{ChannelError, Requester, Ticket};
use crate::config::TimingConfig;
use crate::domain::{SensorReading, SystemSettings};
use crate::guard::AcquireError;
use crate::protocol::{RequestId, SystemCommand, SystemResponse};
use crate::settings_store::{SettingsError, SharedRecord};

/// Reading endpoint kept for the existing data collector
pub const MAILBOX_PATH: &str = "/json/mailbox.json";
pub const READING_PATH: &str = "/api/reading";
pub const SETTINGS_PATH: &str = "/api/settings";

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Error type for network-edge operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointError {
    #[error("controller busy")]
    Busy,
    #[error("timed out waiting for controller")]
    Timeout,
    #[error("sensor unavailable: {0}")]
    Sensor(#[from] AcquireError),
    #[error("settings rejected: {0}")]
    Settings(#[from] SettingsError),
    #[error("response does not match request")]
    Mismatch,
    #[error("malformed request body")]
    BadRequest,
    #[error("no such resource")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("reply buffer too small")]
    Overflow,
}

impl From<ChannelError> for EndpointError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Busy => EndpointError::Busy,
            ChannelError::Mismatch { .. } => EndpointError::Mismatch,
            ChannelError::Timeout | ChannelError::ResponseQueueFull | ChannelError::Abandoned => {
                EndpointError::Timeout
            }
        }
    }
}

impl EndpointError {
    pub fn status(&self) -> StatusCode {
        match self {
            EndpointError::Busy | EndpointError::Timeout => StatusCode::RequestTimeout,
            EndpointError::Sensor(AcquireError::Timeout(_)) => StatusCode::RequestTimeout,
            EndpointError::Sensor(AcquireError::Sensor(_)) => StatusCode::ServiceUnavailable,
            EndpointError::Settings(SettingsError::IncompatibleVersion { .. }) => {
                StatusCode::UnprocessableEntity
            }
            EndpointError::Settings(_) => StatusCode::ServiceUnavailable,
            EndpointError::BadRequest => StatusCode::BadRequest,
            EndpointError::NotFound => StatusCode::NotFound,
            EndpointError::MethodNotAllowed => StatusCode::MethodNotAllowed,
            EndpointError::Mismatch | EndpointError::Overflow => StatusCode::InternalServerError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusCode {
    /// 200, body carries the requested record
    Ok,
    /// 400, request body is not a valid record
    BadRequest,
    /// 404, unknown path
    NotFound,
    /// 405, known path with the wrong method
    MethodNotAllowed,
    /// 408, controller busy or no answer in time
    RequestTimeout,
    /// 422, settings record from an incompatible schema
    UnprocessableEntity,
    /// 500, mismatched response or reply buffer too small
    InternalServerError,
    /// 503, sensor fault or settings storage failure
    ServiceUnavailable,
}

impl StatusCode {
    pub const fn code(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RequestTimeout => 408,
            StatusCode::UnprocessableEntity => 422,
            StatusCode::InternalServerError => 500,
            StatusCode::ServiceUnavailable => 503,
        }
    }

    pub const fn reason(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::UnprocessableEntity => "Unprocessable Entity",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Method {
    /// Read a reading or the live settings
    Get,
    /// Submit a settings record
    Post,
    /// Any method no route accepts
    Other,
}

/// A parsed inbound request
#[derive(Clone, Copy, Debug)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    pub body: &'a [u8],
}

impl<'a> HttpRequest<'a> {
    pub const fn get(path: &'a str) -> Self {
        Self {
            method: Method::Get,
            path,
            body: &[],
        }
    }

    pub const fn post(path: &'a str, body: &'a [u8]) -> Self {
        Self {
            method: Method::Post,
            path,
            body,
        }
    }
}

/// Reply metadata; the body is the first `len` bytes of the output buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpReply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub len: usize,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    status: u16,
}

/// Outstanding reading request
pub struct ReadingTicket<'a, M: RawMutex> {
    ticket: Ticket<'a, M>,
}

impl<M: RawMutex> ReadingTicket<'_, M> {
    pub fn id(&self) -> RequestId {
        self.ticket.id()
    }

    /// Wait up to `timeout` for the reading
    pub async fn await_reading_response(
        self,
        timeout: Duration,
    ) -> Result<SensorReading, EndpointError> {
        match self.ticket.await_response(timeout).await? {
            SystemResponse::Reading(result) => Ok(result?),
            SystemResponse::SettingsUpdate(_) => Err(EndpointError::Mismatch),
        }
    }
}

/// Network-facing API over the command channel
pub struct ReadingEndpoint<'a, M: RawMutex> {
    requester: Requester<'a, M>,
    settings: &'a SharedRecord<M, SystemSettings>,
    timing: TimingConfig,
}

impl<'a, M: RawMutex> ReadingEndpoint<'a, M> {
    pub fn new(
        requester: Requester<'a, M>,
        settings: &'a SharedRecord<M, SystemSettings>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            requester,
            settings,
            timing,
        }
    }

    /// Push a reading request; fails with `Busy` if one is outstanding
    pub async fn enqueue_reading_request(
        &self,
        timeout: Duration,
    ) -> Result<ReadingTicket<'a, M>, EndpointError> {
        let ticket = self
            .requester
            .send_command(SystemCommand::reading_request(), timeout)
            .await?;
        Ok(ReadingTicket { ticket })
    }

    /// Request a fresh reading and wait for it
    pub async fn fetch_reading(&self) -> Result<SensorReading, EndpointError> {
        let ticket = self
            .enqueue_reading_request(self.timing.request_send_timeout)
            .await?;
        ticket
            .await_reading_response(self.timing.response_wait_timeout)
            .await
    }

    /// Send a complete settings record to the control loop
    pub async fn update_settings(&self, settings: SystemSettings) -> Result<(), EndpointError> {
        let response = self
            .requester
            .request(
                SystemCommand::settings_update(settings),
                self.timing.request_send_timeout,
                self.timing.response_wait_timeout,
            )
            .await?;

        match response {
            SystemResponse::SettingsUpdate(result) => Ok(result?),
            SystemResponse::Reading(_) => Err(EndpointError::Mismatch),
        }
    }

    /// Route `request` and write the JSON body into `out`
    pub async fn handle(&self, request: &HttpRequest<'_>, out: &mut [u8]) -> HttpReply {
        match self.route(request, out).await {
            Ok(len) => HttpReply {
                status: StatusCode::Ok,
                content_type: CONTENT_TYPE_JSON,
                len,
            },
            Err(e) => {
                let status = e.status();
                warn!("{} {}: {} ({})", method_name(request.method), request.path, status.code(), e);
                let body = ErrorBody {
                    error: status.reason(),
                    status: status.code(),
                };
                HttpReply {
                    status,
                    content_type: CONTENT_TYPE_JSON,
                    len: serde_json_core::to_slice(&body, out).unwrap_or(0),
                }
            }
        }
    }

    async fn route(&self, request: &HttpRequest<'_>, out: &mut [u8]) -> Result<usize, EndpointError> {
        debug!("{} {}", method_name(request.method), request.path);

        match (request.method, request.path) {
            (Method::Get, READING_PATH | MAILBOX_PATH) => {
                let reading = self.fetch_reading().await?;
                write_json(&reading, out)
            }
            (Method::Get, SETTINGS_PATH) => write_json(&self.settings.get(), out),
            (Method::Post, SETTINGS_PATH) => {
                let (settings, _) = serde_json_core::from_slice::<SystemSettings>(request.body)
                    .map_err(|_| EndpointError::BadRequest)?;
                // The echo must fit before the update is committed
                let len = write_json(&settings, out)?;
                self.update_settings(settings).await?;
                Ok(len)
            }
            (_, READING_PATH | MAILBOX_PATH | SETTINGS_PATH) => Err(EndpointError::MethodNotAllowed),
            _ => Err(EndpointError::NotFound),
        }
    }
}

fn write_json<T: Serialize>(value: &T, out: &mut [u8]) -> Result<usize, EndpointError> {
    serde_json_core::to_slice(value, out).map_err(|_| EndpointError::Overflow)
}

fn method_name(method: Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Post => "POST",
        Method::Other => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::CommandChannel;
    use crate::domain::{RefillMode, SchemaVersion};
    use crate::ports::sensor::SensorError;
    use embassy_futures::join::join;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use futures_executor::block_on;

    type Mutex = CriticalSectionRawMutex;

    const READING: SensorReading = SensorReading {
        time: 1_700_000_000,
        ph: 6.5,
        tds: 420.0,
        temperature_c: 22.0,
        humidity: 60.0,
    };

    fn timing() -> TimingConfig {
        TimingConfig {
            response_wait_timeout: Duration::from_millis(100),
            ..TimingConfig::standard()
        }
    }

    /// Answer the next command with `response`
    async fn reply_once(channel: &CommandChannel<Mutex>, response: SystemResponse) {
        let control = channel.control_end();
        let envelope = control
            .receive_command(Duration::from_millis(100))
            .await
            .unwrap();
        control
            .send_response(envelope.id, response, Duration::from_millis(10))
            .await
            .unwrap();
    }

    #[test]
    fn test_reading_served_as_json() {
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let endpoint = ReadingEndpoint::new(channel.requester(), &settings, timing());
        let mut out = [0u8; 256];

        let (reply, _) = block_on(join(
            endpoint.handle(&HttpRequest::get(MAILBOX_PATH), &mut out),
            reply_once(&channel, SystemResponse::Reading(Ok(READING))),
        ));

        assert_eq!(reply.status, StatusCode::Ok);
        assert_eq!(reply.content_type, "application/json");
        let (served, _) = serde_json_core::from_slice::<SensorReading>(&out[..reply.len]).unwrap();
        assert_eq!(served, READING);
        assert!(core::str::from_utf8(&out[..reply.len]).unwrap().contains("\"temp\":"));
    }

    #[test]
    fn test_busy_maps_to_408() {
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let endpoint = ReadingEndpoint::new(channel.requester(), &settings, timing());
        let mut out = [0u8; 128];

        block_on(async {
            let _outstanding = endpoint
                .enqueue_reading_request(Duration::from_millis(10))
                .await
                .unwrap();
            let reply = endpoint.handle(&HttpRequest::get(READING_PATH), &mut out).await;
            assert_eq!(reply.status.code(), 408);
        });
    }

    #[test]
    fn test_driver_fault_maps_to_503() {
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let endpoint = ReadingEndpoint::new(channel.requester(), &settings, timing());
        let mut out = [0u8; 128];

        let fault = SystemResponse::Reading(Err(AcquireError::Sensor(SensorError::Bus)));
        let (reply, _) = block_on(join(
            endpoint.handle(&HttpRequest::get(READING_PATH), &mut out),
            reply_once(&channel, fault),
        ));

        assert_eq!(reply.status, StatusCode::ServiceUnavailable);
        assert!(channel.is_idle());
    }

    #[test]
    fn test_settings_round_trip_through_controller() {
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let endpoint = ReadingEndpoint::new(channel.requester(), &settings, timing());
        let mut out = [0u8; 256];

        let update = SystemSettings {
            auto_ph_control: true,
            refill_mode: RefillMode::On,
            ..SystemSettings::DEFAULT
        };
        let mut body = [0u8; 256];
        let len = serde_json_core::to_slice(&update, &mut body).unwrap();

        let (reply, _) = block_on(join(
            endpoint.handle(&HttpRequest::post(SETTINGS_PATH, &body[..len]), &mut out),
            reply_once(&channel, SystemResponse::SettingsUpdate(Ok(()))),
        ));
        assert_eq!(reply.status, StatusCode::Ok);
    }

    #[test]
    fn test_rejected_settings_map_to_422() {
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let endpoint = ReadingEndpoint::new(channel.requester(), &settings, timing());
        let mut out = [0u8; 256];

        let future = SystemSettings {
            version: SchemaVersion { major: 2, minor: 0 },
            ..SystemSettings::DEFAULT
        };
        let mut body = [0u8; 256];
        let len = serde_json_core::to_slice(&future, &mut body).unwrap();

        let rejection = SystemResponse::SettingsUpdate(Err(SettingsError::IncompatibleVersion {
            major: 2,
            minor: 0,
        }));
        let (reply, _) = block_on(join(
            endpoint.handle(&HttpRequest::post(SETTINGS_PATH, &body[..len]), &mut out),
            reply_once(&channel, rejection),
        ));
        assert_eq!(reply.status.code(), 422);
    }

    #[test]
    fn test_routing_errors() {
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let endpoint = ReadingEndpoint::new(channel.requester(), &settings, timing());
        let mut out = [0u8; 256];

        block_on(async {
            let missing = endpoint.handle(&HttpRequest::get("/nope"), &mut out).await;
            assert_eq!(missing.status.code(), 404);

            let wrong = endpoint
                .handle(&HttpRequest::post(READING_PATH, b"{}"), &mut out)
                .await;
            assert_eq!(wrong.status.code(), 405);

            let garbage = endpoint
                .handle(&HttpRequest::post(SETTINGS_PATH, b"{\"auto_ph"), &mut out)
                .await;
            assert_eq!(garbage.status.code(), 400);

            let current = endpoint.handle(&HttpRequest::get(SETTINGS_PATH), &mut out).await;
            assert_eq!(current.status, StatusCode::Ok);
            let (served, _) =
                serde_json_core::from_slice::<SystemSettings>(&out[..current.len]).unwrap();
            assert_eq!(served, SystemSettings::DEFAULT);
        });

        // None of these reached the controller
        assert!(channel.is_idle());
        assert!(channel.control_end().try_receive_command().is_none());
    }

    #[test]
    fn test_undersized_reply_buffer_maps_to_500() {
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let endpoint = ReadingEndpoint::new(channel.requester(), &settings, timing());
        let mut out = [0u8; 64];

        let reply = block_on(endpoint.handle(&HttpRequest::get(SETTINGS_PATH), &mut out));
        assert_eq!(reply.status, StatusCode::InternalServerError);
        assert!(reply.len > 0);
        assert!(core::str::from_utf8(&out[..reply.len]).unwrap().contains("500"));
    }

    #[test]
    fn test_update_not_sent_when_echo_cannot_fit() {
        let channel = CommandChannel::<Mutex>::new();
        let settings = SharedRecord::<Mutex, _>::new(SystemSettings::DEFAULT);
        let endpoint = ReadingEndpoint::new(channel.requester(), &settings, timing());
        let mut out = [0u8; 64];

        let update = SystemSettings {
            auto_ph_control: true,
            ..SystemSettings::DEFAULT
        };
        let mut body = [0u8; 256];
        let len = serde_json_core::to_slice(&update, &mut body).unwrap();

        let reply = block_on(
            endpoint.handle(&HttpRequest::post(SETTINGS_PATH, &body[..len]), &mut out),
        );
        assert_eq!(reply.status, StatusCode::InternalServerError);

        // Nothing was committed: no command reached the controller
        assert!(channel.is_idle());
        assert!(channel.control_end().try_receive_command().is_none());
        assert_eq!(settings.get(), SystemSettings::DEFAULT);
    }
}
