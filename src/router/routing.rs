use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::session::SessionListener;
use crate::utils::{read, write};

/// A routed message, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

pub trait MessageSink: Send + Sync {
    fn deliver(&self, message: InboundMessage);
}

impl<F> MessageSink for F
where
    F: Fn(InboundMessage) + Send + Sync,
{
    fn deliver(&self, message: InboundMessage) {
        self(message)
    }
}

#[derive(Default)]
pub struct MessageRouter {
    interest: RwLock<Option<String>>,
    sink: RwLock<Option<Arc<dyn MessageSink>>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interest(topic: impl Into<String>) -> Self {
        let router = Self::new();
        router.set_interest(Some(topic.into()));
        router
    }

    pub fn set_interest(&self, topic: Option<String>) {
        *write(&self.interest) = topic;
    }

    pub fn interest(&self) -> Option<String> {
        read(&self.interest).clone()
    }

    /// Replaces any previously registered sink.
    pub fn register_sink(&self, sink: Arc<dyn MessageSink>) {
        *write(&self.sink) = Some(sink);
    }

    /// Returns whether the message was handed to the sink. Messages on any
    /// other topic are dropped silently.
    pub fn route(&self, topic: &str, payload: &[u8]) -> bool {
        if read(&self.interest).as_deref() != Some(topic) {
            trace!("Dropping message on {topic}: not the followed topic");
            return false;
        }

        let Some(sink) = read(&self.sink).clone() else {
            debug!("Dropping message on {topic}: no sink registered");
            return false;
        };

        sink.deliver(InboundMessage {
            topic: topic.to_string(),
            text: decode_payload(payload),
            received_at: Utc::now(),
        });
        true
    }
}

impl SessionListener for MessageRouter {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        self.route(topic, payload);
    }
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("interest", &self.interest())
            .field("has_sink", &read(&self.sink).is_some())
            .finish()
    }
}

/// Decodes a payload as UTF-8, skipping invalid byte sequences. Never fails.
pub fn decode_payload(payload: &[u8]) -> String {
    payload.utf8_chunks().map(|chunk| chunk.valid()).collect()
}
