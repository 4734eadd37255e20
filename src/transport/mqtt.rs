//! MQTT transport built on `rumqttc`.
//!
//! `connect` creates the `AsyncClient`/`EventLoop` pair and spawns a task
//! that drives the event loop. rumqttc reconnects on the next `poll` after an
//! error, so the worker only has to report what happened and pause for the
//! reconnect delay between attempts:
//!
//! ```text
//! ConnAck(Success)  -> TransportEvent::Connected
//! Publish           -> TransportEvent::Message
//! poll error        -> TransportEvent::Disconnected, sleep, poll again
//! poll error after `disconnect` -> worker stops
//! ```
//!
//! Requests go through the non-blocking `try_*` client methods with QoS 0,
//! so a call never waits on the network. `disconnect` queues a DISCONNECT
//! behind any pending request and lets the worker write both before it
//! stops; the worker is cut off after `DISCONNECT_GRACE` if the broker
//! stalls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{BrokerEndpoint, EventSender, Transport, TransportEvent};
use crate::utils::{ConnectionError, TransportError, lock};

/// Requests rumqttc may queue before `try_*` calls start failing.
const REQUEST_CAPACITY: usize = 64;

/// How long a disconnecting worker may keep flushing queued requests.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

pub struct MqttTransport {
    client_id: String,
    client: Mutex<Option<AsyncClient>>,
    runtime: Mutex<Option<Handle>>,
    connected: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl MqttTransport {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client: Mutex::new(None),
            runtime: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn live_client(&self) -> Result<AsyncClient, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }
        lock(&self.client)
            .clone()
            .ok_or(TransportError::NotConnected)
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("client_id", &self.client_id)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl Transport for MqttTransport {
    fn connect(&self, endpoint: &BrokerEndpoint, events: EventSender) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed);
        }
        endpoint.validate()?;
        if self.client_id.trim().is_empty() {
            return Err(ConnectionError::Setup("empty MQTT client id".into()));
        }
        let runtime = Handle::try_current().map_err(|e| ConnectionError::Setup(e.to_string()))?;

        let mut slot = lock(&self.client);
        if slot.is_some() {
            return Err(ConnectionError::AlreadyStarted);
        }

        let mut options = MqttOptions::new(self.client_id.clone(), endpoint.host.clone(), endpoint.port);
        options.set_keep_alive(endpoint.keep_alive);
        options.set_clean_session(true);

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        // Bounds both the TCP connect and the wait for CONNACK.
        event_loop
            .network_options
            .set_connection_timeout(endpoint.connect_timeout.as_secs().max(1));
        *slot = Some(client);

        runtime.spawn(drive_event_loop(
            event_loop,
            endpoint.clone(),
            self.connected.clone(),
            self.closed.clone(),
            self.cancel.clone(),
            events,
        ));
        *lock(&self.runtime) = Some(runtime);
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.live_client()?.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.live_client()?.try_unsubscribe(topic)?;
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.live_client()?
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())?;
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let client = lock(&self.client).take();
        let was_connected = self.connected.swap(false, Ordering::AcqRel);

        let (Some(client), true) = (client, was_connected) else {
            self.cancel.cancel();
            return Ok(());
        };

        // The worker stops when the broker closes the connection after the
        // DISCONNECT; the timer covers a broker that never does.
        let result = client.try_disconnect().map_err(TransportError::from);
        if result.is_err() {
            self.cancel.cancel();
        } else if let Some(runtime) = lock(&self.runtime).take() {
            let cancel = self.cancel.clone();
            runtime.spawn(async move {
                tokio::time::sleep(DISCONNECT_GRACE).await;
                cancel.cancel();
            });
        } else {
            self.cancel.cancel();
        }
        result
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    endpoint: BrokerEndpoint,
    connected: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: EventSender,
) {
    info!("Starting MQTT event loop for {endpoint}");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            polled = event_loop.poll() => match polled {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        info!("Connected to {endpoint}");
                        connected.store(true, Ordering::Release);
                        let _ = events.send(TransportEvent::Connected);
                    } else {
                        warn!("Broker refused connection: {:?}", ack.code);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    trace!("Received publish on topic {}", publish.topic);
                    let _ = events.send(TransportEvent::Message {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("Disconnected by broker");
                    connected.store(false, Ordering::Release);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("DISCONNECT sent to {endpoint}, waiting for close");
                }
                Ok(other) => trace!("MQTT event: {other:?}"),
                Err(e) => {
                    connected.store(false, Ordering::Release);
                    if closed.load(Ordering::Acquire) {
                        break;
                    }
                    warn!(
                        "Connection to {endpoint} lost, retrying in {:.1}s: {e}",
                        endpoint.reconnect_delay.as_secs_f64()
                    );
                    let _ = events.send(TransportEvent::Disconnected {
                        reason: e.to_string(),
                    });
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(endpoint.reconnect_delay) => {}
                    }
                }
            }
        }
    }

    connected.store(false, Ordering::Release);
    debug!("MQTT event loop for {endpoint} stopped");
}
