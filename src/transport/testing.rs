//! Transport fake that records every call, for unit tests.

use std::sync::Mutex;

use super::{BrokerEndpoint, EventSender, Transport, TransportEvent};
use crate::utils::{ConnectionError, TransportError, lock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    Subscribe(String),
    Unsubscribe(String),
    Publish(String, Vec<u8>),
    Disconnect,
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    events: Mutex<Option<EventSender>>,
    failure: Mutex<Option<TransportError>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    /// Makes every later request call fail with `err` (until cleared).
    pub fn fail_with(&self, err: Option<TransportError>) {
        *lock(&self.failure) = err;
    }

    /// Pushes an event as the background worker would.
    pub fn emit(&self, event: TransportEvent) -> bool {
        lock(&self.events)
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    fn record(&self, call: Call) -> Result<(), TransportError> {
        if let Some(err) = lock(&self.failure).clone() {
            return Err(err);
        }
        lock(&self.calls).push(call);
        Ok(())
    }
}

impl Transport for RecordingTransport {
    fn connect(&self, endpoint: &BrokerEndpoint, events: EventSender) -> Result<(), ConnectionError> {
        *lock(&self.events) = Some(events);
        lock(&self.calls).push(Call::Connect(endpoint.to_string()));
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.record(Call::Subscribe(topic.to_string()))
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.record(Call::Unsubscribe(topic.to_string()))
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.record(Call::Publish(topic.to_string(), payload.to_vec()))
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        lock(&self.events).take();
        self.record(Call::Disconnect)
    }
}
