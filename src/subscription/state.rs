use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::router::MessageRouter;
use crate::session::SessionListener;
use crate::topic::{HashtagTopic, canonicalize};
use crate::transport::Transport;
use crate::utils::{SubscribeError, TransportError, lock};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubscriptionSlot {
    #[default]
    Idle,
    Following { tag: HashtagTopic, topic: String },
}

impl SubscriptionSlot {
    pub fn active_topic(&self) -> Option<&str> {
        match self {
            SubscriptionSlot::Idle => None,
            SubscriptionSlot::Following { topic, .. } => Some(topic),
        }
    }
}

/// Outcome of a subscription change, for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicEvent {
    Subscribed { tag: HashtagTopic, topic: String },
    Unsubscribed { topic: String },
}

pub struct SubscriptionState {
    transport: Arc<dyn Transport>,
    base_prefix: String,
    slot: Mutex<SubscriptionSlot>,
    router: Option<Arc<MessageRouter>>,
}

impl SubscriptionState {
    pub fn new(transport: Arc<dyn Transport>, base_prefix: impl Into<String>) -> Self {
        Self {
            transport,
            base_prefix: base_prefix.into(),
            slot: Mutex::new(SubscriptionSlot::Idle),
            router: None,
        }
    }

    /// Keeps `router`'s topic of interest equal to the followed topic.
    pub fn with_router(mut self, router: Arc<MessageRouter>) -> Self {
        router.set_interest(lock(&self.slot).active_topic().map(str::to_string));
        self.router = Some(router);
        self
    }

    pub fn slot(&self) -> SubscriptionSlot {
        lock(&self.slot).clone()
    }

    pub fn active_topic(&self) -> Option<String> {
        lock(&self.slot).active_topic().map(str::to_string)
    }

    /// Follows `raw_tag`. The transport subscribe is always issued, even when
    /// the topic is already followed. A previously followed different topic
    /// is not unsubscribed: only the newest topic is tracked, though the
    /// broker may keep delivering the old one until it is unsubscribed.
    ///
    /// On a transport failure the slot is left unchanged.
    pub fn request_subscribe(&self, raw_tag: &str) -> Result<TopicEvent, SubscribeError> {
        let tag = canonicalize(raw_tag)?;
        let topic = tag.under(&self.base_prefix);

        let mut slot = lock(&self.slot);
        match slot.active_topic() {
            Some(current) if current == topic => {
                debug!("Already following {topic}; re-issuing subscribe");
            }
            Some(current) => {
                warn!("Switching to {topic} while still subscribed to {current}");
            }
            None => {}
        }

        self.transport.subscribe(&topic)?;

        *slot = SubscriptionSlot::Following {
            tag: tag.clone(),
            topic: topic.clone(),
        };
        self.sync_router(&slot);
        info!("Subscribed to #{tag} ({topic})");

        Ok(TopicEvent::Subscribed { tag, topic })
    }

    /// Stops following the current topic. `Ok(None)` when nothing was
    /// followed. On a transport failure the slot is left unchanged.
    pub fn request_unsubscribe(&self) -> Result<Option<TopicEvent>, TransportError> {
        let mut slot = lock(&self.slot);
        let Some(topic) = slot.active_topic().map(str::to_string) else {
            debug!("Unsubscribe requested while idle");
            return Ok(None);
        };

        self.transport.unsubscribe(&topic)?;

        *slot = SubscriptionSlot::Idle;
        self.sync_router(&slot);
        info!("Unsubscribed from {topic}");

        Ok(Some(TopicEvent::Unsubscribed { topic }))
    }

    /// Re-issues the subscribe for the followed topic after a (re)connect,
    /// since a fresh broker connection carries no subscriptions. Returns the
    /// topic when a subscribe was issued successfully.
    pub fn on_reconnected(&self) -> Option<String> {
        let slot = lock(&self.slot);
        let topic = slot.active_topic()?;

        match self.transport.subscribe(topic) {
            Ok(()) => {
                info!("Resubscribed to {topic} after reconnect");
                Some(topic.to_string())
            }
            Err(e) => {
                warn!("Resubscribe to {topic} failed: {e}");
                None
            }
        }
    }

    fn sync_router(&self, slot: &SubscriptionSlot) {
        if let Some(router) = &self.router {
            router.set_interest(slot.active_topic().map(str::to_string));
        }
    }
}

impl SessionListener for SubscriptionState {
    fn on_connected(&self) {
        self.on_reconnected();
    }
}

impl std::fmt::Debug for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionState")
            .field("base_prefix", &self.base_prefix)
            .field("slot", &self.slot())
            .finish()
    }
}
