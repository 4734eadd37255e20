//! WebSocket transport
//!
//! Client side of a JSON-over-WebSocket pub/sub broker. Responsibilities:
//! - Connect to `ws://{host}:{port}` on a background task, bounded by the
//!   endpoint's connect timeout
//! - Forward subscribe/unsubscribe/publish requests as `ClientFrame`s
//! - Turn delivered `ServerFrame::Message`s into `TransportEvent::Message`
//! - Report every connect and drop, then retry after the reconnect delay
//!   until `disconnect` is called

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;

use super::message::{ClientFrame, ServerFrame};
use super::{BrokerEndpoint, EventSender, Transport, TransportEvent};
use crate::utils::{ConnectionError, TransportError, lock};

type Outbound = mpsc::UnboundedSender<WsMessage>;

#[derive(Debug, Default)]
struct Shared {
    /// Present only while a connection is up.
    outbound: Mutex<Option<Outbound>>,
    started: Mutex<bool>,
    cancel: CancellationToken,
}

#[derive(Debug, Default, Clone)]
pub struct WsTransport {
    shared: Arc<Shared>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn send_frame(&self, frame: &ClientFrame) -> Result<(), TransportError> {
        if self.shared.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let text = serde_json::to_string(frame)?;
        let outbound = lock(&self.shared.outbound);
        let tx = outbound.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(WsMessage::text(text))
            .map_err(|_| TransportError::NotConnected)
    }
}

impl Transport for WsTransport {
    fn connect(&self, endpoint: &BrokerEndpoint, events: EventSender) -> Result<(), ConnectionError> {
        if self.shared.cancel.is_cancelled() {
            return Err(ConnectionError::Closed);
        }
        endpoint.validate()?;
        let runtime = Handle::try_current().map_err(|e| ConnectionError::Setup(e.to_string()))?;

        let mut started = lock(&self.shared.started);
        if *started {
            return Err(ConnectionError::AlreadyStarted);
        }
        *started = true;

        let url = format!("ws://{}:{}", endpoint.host, endpoint.port);
        runtime.spawn(run_connection_loop(
            url,
            endpoint.clone(),
            self.shared.clone(),
            events,
        ));
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.send_frame(&ClientFrame::Subscribe {
            topic: topic.to_string(),
        })
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.send_frame(&ClientFrame::Unsubscribe {
            topic: topic.to_string(),
        })
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.send_frame(&ClientFrame::Publish {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        })
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.shared.cancel.cancel();
        lock(&self.shared.outbound).take();
        Ok(())
    }
}

async fn run_connection_loop(
    url: String,
    endpoint: BrokerEndpoint,
    shared: Arc<Shared>,
    events: EventSender,
) {
    let cancel = shared.cancel.clone();

    loop {
        let attempt = tokio::select! {
            _ = cancel.cancelled() => break,
            attempt = tokio::time::timeout(endpoint.connect_timeout, connect_async(url.as_str())) => attempt,
        };

        let reason = match attempt {
            Ok(Ok((ws_stream, _response))) => {
                info!("Connected to {url}");
                let (mut ws_sender, mut ws_receiver) = ws_stream.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
                *lock(&shared.outbound) = Some(tx);
                let _ = events.send(TransportEvent::Connected);

                let reason = loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = ws_sender.send(WsMessage::Close(None)).await;
                            break "client shutdown".to_string();
                        }
                        Some(msg) = rx.recv() => {
                            if let Err(e) = ws_sender.send(msg).await {
                                break e.to_string();
                            }
                        }
                        incoming = ws_receiver.next() => match incoming {
                            Some(Ok(msg)) if msg.is_text() => {
                                if let Ok(text) = msg.to_text() {
                                    handle_server_text(text, &events);
                                }
                            }
                            Some(Ok(WsMessage::Close(_))) | None => {
                                break "connection closed by broker".to_string();
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break e.to_string(),
                        }
                    }
                };

                lock(&shared.outbound).take();
                reason
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "connect timed out after {:.1}s",
                endpoint.connect_timeout.as_secs_f64()
            ),
        };

        if cancel.is_cancelled() {
            break;
        }

        warn!("Connection to {url} lost: {reason}");
        let _ = events.send(TransportEvent::Disconnected { reason });

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(endpoint.reconnect_delay) => {}
        }
    }

    debug!("WebSocket worker for {url} stopped");
}

fn handle_server_text(text: &str, events: &EventSender) {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame::Message { topic, payload, .. }) => {
            let _ = events.send(TransportEvent::Message {
                topic,
                payload: payload.into_bytes(),
            });
        }
        Ok(ServerFrame::Error { message }) => {
            warn!("Broker reported error: {message}");
        }
        Err(err) => {
            warn!(
                "Invalid broker frame: {err} | {}",
                text.chars().take(100).collect::<String>()
            );
        }
    }
}
