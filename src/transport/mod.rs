//! The `transport` module is the boundary between the hashtag feed core and
//! whatever publish/subscribe broker carries the messages.
//!
//! The core depends only on the [`Transport`] trait: every call enqueues
//! work and returns immediately, while network I/O runs on a background task
//! that reports lifecycle changes and inbound messages as [`TransportEvent`]s.
//!
//! Backends:
//! - `mqtt`: MQTT 3.1.1 via `rumqttc`
//! - `websocket`: JSON frames over WebSocket via `tokio-tungstenite`
//! - `local`: an in-process broker, used for tests and demos

pub mod local;
pub mod message;
pub mod mqtt;
pub mod websocket;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::{BrokerSettings, Settings, TransportKind};
use crate::utils::{ConnectionError, TransportError};

pub use local::{LocalBroker, LocalTransport, SharedBroker};
pub use mqtt::MqttTransport;
pub use websocket::WsTransport;

/// Events a transport raises from its background worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String },
    Message { topic: String, payload: Vec<u8> },
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Broker address plus the timing knobs a network transport needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
}

impl BrokerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            keep_alive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(1),
        }
    }

    pub fn from_settings(settings: &BrokerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            keep_alive: settings.keep_alive(),
            connect_timeout: settings.connect_timeout(),
            reconnect_delay: settings.reconnect_delay(),
        }
    }

    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.host.trim().is_empty() {
            return Err(ConnectionError::InvalidEndpoint("empty host".into()));
        }
        if self.port == 0 {
            return Err(ConnectionError::InvalidEndpoint("port 0".into()));
        }
        Ok(())
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Minimal publish/subscribe client interface.
///
/// Implementations must not block: `subscribe`, `unsubscribe` and `publish`
/// only hand the request to the background worker. Calls made while no
/// connection is up fail with `TransportError::NotConnected`; calls made
/// after `disconnect` fail with `TransportError::Closed`.
pub trait Transport: Send + Sync + 'static {
    /// Starts the background worker. Success or failure of the actual
    /// connection is reported through `events` only, possibly many times.
    fn connect(&self, endpoint: &BrokerEndpoint, events: EventSender)
    -> Result<(), ConnectionError>;

    fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Stops the background worker. Calling it twice, or before `connect`,
    /// is allowed.
    fn disconnect(&self) -> Result<(), TransportError>;
}

/// Builds the network transport selected in `settings`.
pub fn build_transport(settings: &Settings, client_id: &str) -> Arc<dyn Transport> {
    match settings.broker.transport {
        TransportKind::Mqtt => Arc::new(MqttTransport::new(client_id)),
        TransportKind::Websocket => Arc::new(WsTransport::new()),
    }
}

#[cfg(test)]
pub(crate) mod testing;


#[cfg(test)]
mod mqtt_tests;
