//! In-process broker
//!
//! `LocalBroker` keeps, per topic name, the set of subscriber ids and routes
//! a published payload to every subscriber of the exact topic. Each
//! `LocalTransport` is one client connection to it.
//!
//! A connection can be severed and restored through the broker to simulate
//! a network drop; like a real broker, a severed client's subscriptions are
//! forgotten and must be re-issued after it comes back.
//!
//! Concurrency note: the broker lives behind a `Mutex` (`SharedBroker`) and
//! never calls back into its clients synchronously; every notification goes
//! through the client's event channel.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, trace, warn};

use super::{BrokerEndpoint, EventSender, Transport, TransportEvent};
use crate::utils::{ConnectionError, TransportError, lock};

pub type SubscriberId = String;

pub type SharedBroker = Arc<Mutex<LocalBroker>>;

#[derive(Debug, Default)]
struct Topic {
    subscribers: HashSet<SubscriberId>,
}

impl Topic {
    /// Add a subscriber to the topic. Duplicate adds are ignored.
    fn subscribe(&mut self, id: SubscriberId) {
        self.subscribers.insert(id);
    }

    fn unsubscribe(&mut self, id: &str) {
        self.subscribers.remove(id);
    }
}

#[derive(Debug, Default)]
pub struct LocalBroker {
    topics: HashMap<String, Topic>,
    clients: HashMap<SubscriberId, EventSender>,
    severed: HashMap<SubscriberId, EventSender>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedBroker {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Registers a client connection and tells it that it is connected.
    pub fn register_client(&mut self, id: SubscriberId, sender: EventSender) {
        let _ = sender.send(TransportEvent::Connected);
        self.severed.remove(&id);
        self.clients.insert(id, sender);
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.clients.contains_key(id)
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.clients.contains_key(id) || self.severed.contains_key(id)
    }

    /// Removes a client and all of its subscriptions without notifying it.
    pub fn cleanup_client(&mut self, id: &str) {
        self.clients.remove(id);
        self.severed.remove(id);
        self.forget_subscriptions(id);
        debug!("Cleaned up local client {id}");
    }

    /// Drops a live connection as a network failure would: the client is
    /// told it is disconnected and its subscriptions are forgotten.
    pub fn sever(&mut self, id: &str) -> bool {
        let Some(sender) = self.clients.remove(id) else {
            return false;
        };
        self.forget_subscriptions(id);
        let _ = sender.send(TransportEvent::Disconnected {
            reason: "connection lost".to_string(),
        });
        self.severed.insert(id.to_string(), sender);
        info!("Severed local client {id}");
        true
    }

    /// Brings a severed client back, as an automatic reconnect would.
    pub fn restore(&mut self, id: &str) -> bool {
        let Some(sender) = self.severed.remove(id) else {
            return false;
        };
        self.register_client(id.to_string(), sender);
        info!("Restored local client {id}");
        true
    }

    /// Subscribes a client to a topic. Automatically creates the topic if it doesn't exist.
    pub fn subscribe(&mut self, topic: &str, subscriber: SubscriberId) {
        self.topics
            .entry(topic.to_string())
            .or_default()
            .subscribe(subscriber);
    }

    /// If the topic does not exist, it will not perform any action
    pub fn unsubscribe(&mut self, topic: &str, subscriber: &str) {
        if let Some(t) = self.topics.get_mut(topic) {
            t.unsubscribe(subscriber);
        }
    }

    /// Delivers `payload` to every connected subscriber of exactly `topic`.
    /// Returns how many subscribers it was handed to.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> usize {
        let Some(t) = self.topics.get(topic) else {
            trace!("No subscribers for topic '{topic}'");
            return 0;
        };

        let mut delivered = 0;
        for sub_id in &t.subscribers {
            match self.clients.get(sub_id) {
                Some(sender) => {
                    let event = TransportEvent::Message {
                        topic: topic.to_string(),
                        payload: payload.to_vec(),
                    };
                    if sender.send(event).is_err() {
                        warn!("Failed to send to {sub_id}: channel closed");
                    } else {
                        delivered += 1;
                    }
                }
                None => warn!("No client registered with id: {sub_id}"),
            }
        }
        delivered
    }

    pub fn subscribers(&self, topic: &str) -> Vec<SubscriberId> {
        let mut ids: Vec<_> = self
            .topics
            .get(topic)
            .map(|t| t.subscribers.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn forget_subscriptions(&mut self, id: &str) {
        for topic in self.topics.values_mut() {
            topic.unsubscribe(id);
        }
    }
}

/// One client connection to a `LocalBroker`.
#[derive(Debug)]
pub struct LocalTransport {
    id: SubscriberId,
    broker: SharedBroker,
    closed: AtomicBool,
}

impl LocalTransport {
    pub fn new(id: impl Into<SubscriberId>, broker: SharedBroker) -> Self {
        Self {
            id: id.into(),
            broker,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn with_connection<R>(
        &self,
        f: impl FnOnce(&mut LocalBroker) -> R,
    ) -> Result<R, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut broker = lock(&self.broker);
        if !broker.is_connected(&self.id) {
            return Err(TransportError::NotConnected);
        }
        Ok(f(&mut broker))
    }
}

impl Transport for LocalTransport {
    fn connect(
        &self,
        _endpoint: &BrokerEndpoint,
        events: EventSender,
    ) -> Result<(), ConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConnectionError::Closed);
        }
        let mut broker = lock(&self.broker);
        if broker.is_known(&self.id) {
            return Err(ConnectionError::AlreadyStarted);
        }
        broker.register_client(self.id.clone(), events);
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.with_connection(|broker| broker.subscribe(topic, self.id.clone()))
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.with_connection(|broker| broker.unsubscribe(topic, &self.id))
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let delivered = self.with_connection(|broker| broker.publish(topic, payload))?;
        trace!("{} published to {topic} ({delivered} subscribers)", self.id);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            lock(&self.broker).cleanup_client(&self.id);
        }
        Ok(())
    }
}
