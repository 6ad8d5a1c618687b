use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use url::Url;

use crate::{
    backend::endpoint::{chat_socket_url, EndpointError},
    domain::{
        credential::Credential,
        status::{now_unix_ms, ConnectionSnapshot, ConnectionState},
    },
    infra::config::RealtimeConfig,
    realtime::{protocol::OutboundFrame, timer::CancellableTimer},
    usecases::contracts::FrameSender,
};

const TRANSPORT_CONNECTED: &str = "TRANSPORT_CONNECTED";
const TRANSPORT_CLOSED: &str = "TRANSPORT_CLOSED";
const TRANSPORT_RECONNECT_SCHEDULED: &str = "TRANSPORT_RECONNECT_SCHEDULED";
const TRANSPORT_GAVE_UP: &str = "TRANSPORT_GAVE_UP";
const TRANSPORT_ENDPOINT_INVALID: &str = "TRANSPORT_ENDPOINT_INVALID";
const TRANSPORT_HEARTBEAT_FAILED: &str = "TRANSPORT_HEARTBEAT_FAILED";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket is not connected")]
    NotConnected,
    #[error("socket task has already exited")]
    LinkClosed,
    #[error("failed to encode outbound frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("cannot derive socket endpoint: {0}")]
    InvalidEndpoint(#[source] EndpointError),
}

/// Everything a socket task or transport timer reports back to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportInput {
    Opened { connection_id: u64 },
    Frame { connection_id: u64, text: String },
    Closed { connection_id: u64, reason: String },
    ReconnectDue { generation: u64 },
    HeartbeatDue { generation: u64 },
}

/// What the owner has to act on after [`TransportSession::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    Idle,
    Opened,
    Frame(String),
    Closed,
}

pub trait SocketLink: Send {
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    fn close(&mut self);
}

pub trait SocketConnector: Send + Sync {
    /// Starts connecting in the background. Lifecycle events for the new
    /// connection are reported on `events` tagged with `connection_id`.
    fn open(
        &self,
        connection_id: u64,
        url: Url,
        events: mpsc::UnboundedSender<TransportInput>,
    ) -> Box<dyn SocketLink>;
}

/// Owns at most one live socket plus its heartbeat and reconnect timers.
///
/// Events from superseded connections are ignored, and a connection is
/// considered lost at most once, so a local teardown never schedules a
/// reconnect.
pub struct TransportSession {
    heartbeat_interval: Duration,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
    api_url: String,
    connector: Arc<dyn SocketConnector>,
    events_tx: mpsc::UnboundedSender<TransportInput>,
    status: watch::Sender<ConnectionSnapshot>,
    token: Option<String>,
    link: Option<Box<dyn SocketLink>>,
    connection_id: Option<u64>,
    last_connection_id: u64,
    reconnect: CancellableTimer,
    heartbeat: CancellableTimer,
}

impl TransportSession {
    pub fn new(
        config: &RealtimeConfig,
        api_url: &str,
        connector: Arc<dyn SocketConnector>,
        status: watch::Sender<ConnectionSnapshot>,
    ) -> (Self, mpsc::UnboundedReceiver<TransportInput>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let session = Self {
            heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            max_reconnect_attempts: config.max_reconnect_attempts,
            api_url: api_url.to_owned(),
            connector,
            events_tx,
            status,
            token: None,
            link: None,
            connection_id: None,
            last_connection_id: 0,
            reconnect: CancellableTimer::default(),
            heartbeat: CancellableTimer::default(),
        };

        (session, events_rx)
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.status.borrow().clone()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_armed()
    }

    /// Replaces any current connection with a fresh one for `credential`
    /// and resets the reconnect budget.
    pub fn connect(&mut self, credential: &Credential) -> Result<(), TransportError> {
        self.teardown();
        self.token = Some(credential.token.clone());
        self.update_status(|snapshot| {
            snapshot.reconnect_attempts = 0;
            snapshot.gave_up = false;
            snapshot.last_error = None;
        });
        self.open()
    }

    /// Closes the socket and cancels all timers. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.teardown();
        self.update_status(|snapshot| {
            snapshot.state = ConnectionState::Disconnected;
        });
    }

    /// Like [`Self::disconnect`] but also forgets the token.
    pub fn reset(&mut self) {
        self.disconnect();
        self.token = None;
        self.update_status(|snapshot| {
            snapshot.reconnect_attempts = 0;
            snapshot.gave_up = false;
            snapshot.last_error = None;
        });
    }

    pub fn handle(&mut self, input: TransportInput) -> TransportOutcome {
        match input {
            TransportInput::Opened { connection_id } if self.is_current(connection_id) => {
                tracing::info!(code = TRANSPORT_CONNECTED, connection_id, "chat socket connected");
                self.update_status(|snapshot| {
                    snapshot.state = ConnectionState::Connected;
                    snapshot.reconnect_attempts = 0;
                    snapshot.gave_up = false;
                    snapshot.last_error = None;
                });
                self.arm_heartbeat();
                TransportOutcome::Opened
            }
            TransportInput::Frame {
                connection_id,
                text,
            } if self.is_current(connection_id) => TransportOutcome::Frame(text),
            TransportInput::Closed {
                connection_id,
                reason,
            } if self.is_current(connection_id) => {
                self.on_connection_lost(connection_id, reason);
                TransportOutcome::Closed
            }
            TransportInput::ReconnectDue { generation } => {
                if self.reconnect.accept(generation) {
                    if let Err(error) = self.open() {
                        tracing::warn!(error = %error, "reconnect attempt could not start");
                    }
                }
                TransportOutcome::Idle
            }
            TransportInput::HeartbeatDue { generation } => {
                if self.heartbeat.accept(generation) && self.is_connected() {
                    if let Err(error) = self.send_frame(&OutboundFrame::Ping) {
                        tracing::warn!(
                            code = TRANSPORT_HEARTBEAT_FAILED,
                            error = %error,
                            "heartbeat ping failed"
                        );
                    }
                    self.arm_heartbeat();
                }
                TransportOutcome::Idle
            }
            TransportInput::Opened { connection_id }
            | TransportInput::Frame { connection_id, .. }
            | TransportInput::Closed { connection_id, .. } => {
                tracing::debug!(connection_id, "ignoring event from stale connection");
                TransportOutcome::Idle
            }
        }
    }

    fn is_current(&self, connection_id: u64) -> bool {
        self.connection_id == Some(connection_id)
    }

    fn open(&mut self) -> Result<(), TransportError> {
        let Some(token) = self.token.as_deref() else {
            return Err(TransportError::NotConnected);
        };

        let url = match chat_socket_url(&self.api_url, token) {
            Ok(url) => url,
            Err(error) => {
                tracing::error!(
                    code = TRANSPORT_ENDPOINT_INVALID,
                    error = %error,
                    "cannot derive chat socket url"
                );
                let message = error.to_string();
                self.update_status(|snapshot| {
                    snapshot.state = ConnectionState::Disconnected;
                    snapshot.last_error = Some(message);
                });
                return Err(TransportError::InvalidEndpoint(error));
            }
        };

        self.last_connection_id += 1;
        let connection_id = self.last_connection_id;
        self.connection_id = Some(connection_id);
        self.link = Some(self.connector.open(connection_id, url, self.events_tx.clone()));
        self.update_status(|snapshot| {
            snapshot.state = ConnectionState::Connecting;
        });
        Ok(())
    }

    fn on_connection_lost(&mut self, connection_id: u64, reason: String) {
        self.close_link();
        self.heartbeat.cancel();
        self.reconnect.cancel();

        let attempts = self.snapshot().reconnect_attempts;
        let retry = attempts < self.max_reconnect_attempts;

        if retry {
            let events_tx = self.events_tx.clone();
            self.reconnect.arm(self.reconnect_delay, move |generation| {
                let _ = events_tx.send(TransportInput::ReconnectDue { generation });
            });
            tracing::warn!(
                code = TRANSPORT_RECONNECT_SCHEDULED,
                connection_id,
                attempt = attempts + 1,
                max_attempts = self.max_reconnect_attempts,
                reason = %reason,
                "chat socket closed; reconnect scheduled"
            );
        } else {
            tracing::error!(
                code = TRANSPORT_GAVE_UP,
                connection_id,
                max_attempts = self.max_reconnect_attempts,
                reason = %reason,
                "chat socket closed; reconnect attempts exhausted"
            );
        }

        tracing::debug!(code = TRANSPORT_CLOSED, connection_id, "transport marked disconnected");
        self.update_status(|snapshot| {
            snapshot.state = ConnectionState::Disconnected;
            snapshot.last_error = Some(reason);
            if retry {
                snapshot.reconnect_attempts = attempts + 1;
            } else {
                snapshot.gave_up = true;
            }
        });
    }

    fn arm_heartbeat(&mut self) {
        let events_tx = self.events_tx.clone();
        self.heartbeat.arm(self.heartbeat_interval, move |generation| {
            let _ = events_tx.send(TransportInput::HeartbeatDue { generation });
        });
    }

    fn teardown(&mut self) {
        self.reconnect.cancel();
        self.heartbeat.cancel();
        self.close_link();
    }

    fn close_link(&mut self) {
        self.connection_id = None;
        if let Some(mut link) = self.link.take() {
            link.close();
        }
    }

    fn update_status<F>(&self, mutator: F)
    where
        F: FnOnce(&mut ConnectionSnapshot),
    {
        self.status.send_modify(|snapshot| {
            mutator(snapshot);
            snapshot.updated_at_unix_ms = now_unix_ms();
        });
    }
}

impl FrameSender for TransportSession {
    fn is_connected(&self) -> bool {
        self.link.is_some() && self.status.borrow().is_connected()
    }

    fn send_frame(&mut self, frame: &OutboundFrame) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let text = frame.encode().map_err(TransportError::Encode)?;
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        tracing::trace!(kind = frame.kind(), "sending frame");
        link.send_text(text)
    }
}
