//! Tweet client
//!
//! `TweetClient` is what a presentation layer talks to. It wires one
//! `ConnectionSession` to a `SubscriptionState`, a `PublishGateway` and a
//! `MessageRouter` over a single transport, and reports everything the UI
//! needs to render (status, topic changes, routed messages) as
//! `ClientEvent`s on an unbounded channel.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::config::Settings;
use crate::publish::{PublishGateway, PublishedReceipt};
use crate::router::{InboundMessage, MessageRouter};
use crate::session::{ConnectionSession, ConnectionStatus, SessionListener};
use crate::subscription::{SubscriptionState, TopicEvent};
use crate::transport::{BrokerEndpoint, Transport, build_transport};
use crate::utils::{ConnectionError, PublishError, SubscribeError, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Status {
        status: ConnectionStatus,
        endpoint: String,
        reason: Option<String>,
    },
    Topic(TopicEvent),
    Message(InboundMessage),
}

/// Turns session lifecycle callbacks into `ClientEvent::Status`.
struct StatusForwarder {
    events: UnboundedSender<ClientEvent>,
    endpoint: String,
}

impl SessionListener for StatusForwarder {
    fn on_connected(&self) {
        let _ = self.events.send(ClientEvent::Status {
            status: ConnectionStatus::Connected,
            endpoint: self.endpoint.clone(),
            reason: None,
        });
    }

    fn on_disconnected(&self, reason: &str) {
        let _ = self.events.send(ClientEvent::Status {
            status: ConnectionStatus::Disconnected,
            endpoint: self.endpoint.clone(),
            reason: Some(reason.to_string()),
        });
    }
}

#[derive(Debug)]
pub struct TweetClient {
    id: String,
    session: ConnectionSession,
    subscriptions: Arc<SubscriptionState>,
    gateway: PublishGateway,
    router: Arc<MessageRouter>,
    events: UnboundedSender<ClientEvent>,
}

impl TweetClient {
    /// Builds a client over `transport`. Nothing connects until `connect`.
    pub fn new(
        id: impl Into<String>,
        settings: &Settings,
        transport: Arc<dyn Transport>,
    ) -> (Self, UnboundedReceiver<ClientEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let endpoint = BrokerEndpoint::from_settings(&settings.broker);
        let base_prefix = settings.topics.base_prefix.clone();

        let session = ConnectionSession::new(transport.clone(), endpoint, base_prefix.clone());

        let router = Arc::new(MessageRouter::new());
        let sink_events = events.clone();
        router.register_sink(Arc::new(move |message: InboundMessage| {
            let _ = sink_events.send(ClientEvent::Message(message));
        }));

        let subscriptions = Arc::new(
            SubscriptionState::new(transport.clone(), base_prefix.clone())
                .with_router(router.clone()),
        );
        let gateway = PublishGateway::new(transport, base_prefix);

        // Resubscribe before the UI hears about the reconnect.
        session.register_listener(subscriptions.clone());
        session.register_listener(Arc::new(StatusForwarder {
            events: events.clone(),
            endpoint: session.endpoint().to_string(),
        }));
        session.register_listener(router.clone());

        let client = Self {
            id: id.into(),
            session,
            subscriptions,
            gateway,
            router,
            events,
        };
        (client, rx)
    }

    /// Builds a client over the network transport named in `settings`.
    pub fn from_settings(settings: &Settings) -> (Self, UnboundedReceiver<ClientEvent>) {
        let id = settings.client.resolved_client_id();
        let transport = build_transport(settings, &id);
        Self::new(id, settings, transport)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session.status()
    }

    pub fn active_topic(&self) -> Option<String> {
        self.subscriptions.active_topic()
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn connect(&self) -> Result<(), ConnectionError> {
        self.session.connect()
    }

    pub fn publish(
        &self,
        sender: &str,
        body: &str,
        raw_topic: &str,
    ) -> Result<PublishedReceipt, PublishError> {
        self.gateway.publish(sender, body, raw_topic)
    }

    pub fn request_subscribe(&self, raw_topic: &str) -> Result<TopicEvent, SubscribeError> {
        let event = self.subscriptions.request_subscribe(raw_topic)?;
        let _ = self.events.send(ClientEvent::Topic(event.clone()));
        Ok(event)
    }

    pub fn request_unsubscribe(&self) -> Result<Option<TopicEvent>, TransportError> {
        let event = self.subscriptions.request_unsubscribe()?;
        if let Some(event) = &event {
            let _ = self.events.send(ClientEvent::Topic(event.clone()));
        }
        Ok(event)
    }

    /// Leaves the followed topic (best effort) and disconnects. Never fails
    /// and may be called more than once.
    pub fn shutdown(&self) {
        if self.session.is_closed() {
            return;
        }
        if let Err(e) = self.subscriptions.request_unsubscribe() {
            debug!("Ignoring unsubscribe failure during shutdown: {e}");
        }
        self.session.disconnect();
    }
}
