use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::transport::{BrokerEndpoint, Transport, TransportEvent};
use crate::utils::{ConnectionError, lock, read, write};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("Disconnected"),
            ConnectionStatus::Connected => f.write_str("Connected"),
        }
    }
}

/// Receives session events. Callbacks run on the session's dispatcher task,
/// never on the caller's thread, and must not block.
pub trait SessionListener: Send + Sync {
    /// Fires on every (re)connection, including after an unsolicited drop.
    fn on_connected(&self) {}

    fn on_disconnected(&self, _reason: &str) {}

    fn on_message(&self, _topic: &str, _payload: &[u8]) {}
}

#[derive(Default)]
struct Shared {
    status: Mutex<ConnectionStatus>,
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
    closed: AtomicBool,
}

impl Shared {
    fn handle_event(&self, event: TransportEvent) {
        if self.closed.load(Ordering::SeqCst) {
            debug!("Ignoring {event:?} after shutdown");
            return;
        }

        match event {
            TransportEvent::Connected => {
                *lock(&self.status) = ConnectionStatus::Connected;
                info!("Session connected");
                for listener in self.snapshot() {
                    listener.on_connected();
                }
            }
            TransportEvent::Disconnected { reason } => {
                let previous =
                    std::mem::replace(&mut *lock(&self.status), ConnectionStatus::Disconnected);
                if previous == ConnectionStatus::Connected {
                    warn!("Session disconnected: {reason}");
                } else {
                    debug!("Connection attempt failed: {reason}");
                }
                for listener in self.snapshot() {
                    listener.on_disconnected(&reason);
                }
            }
            TransportEvent::Message { topic, payload } => {
                trace!("Inbound message on {topic} ({} bytes)", payload.len());
                for listener in self.snapshot() {
                    listener.on_message(&topic, &payload);
                }
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn SessionListener>> {
        read(&self.listeners).clone()
    }
}

/// One logical actor's connection to the broker.
pub struct ConnectionSession {
    transport: Arc<dyn Transport>,
    endpoint: BrokerEndpoint,
    base_prefix: String,
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: BrokerEndpoint,
        base_prefix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            endpoint,
            base_prefix: base_prefix.into(),
            shared: Arc::new(Shared::default()),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }

    pub fn base_prefix(&self) -> &str {
        &self.base_prefix
    }

    pub fn status(&self) -> ConnectionStatus {
        *lock(&self.shared.status)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Listeners are called in registration order.
    pub fn register_listener(&self, listener: Arc<dyn SessionListener>) {
        write(&self.shared.listeners).push(listener);
    }

    /// Starts the transport's background worker and the dispatcher that
    /// feeds its events to listeners. Returns as soon as both are running;
    /// the outcome of the connection itself arrives as events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        let mut dispatcher = lock(&self.dispatcher);
        if dispatcher.is_some() {
            return Err(ConnectionError::AlreadyStarted);
        }
        self.endpoint.validate()?;
        let runtime = Handle::try_current().map_err(|e| ConnectionError::Setup(e.to_string()))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.transport.connect(&self.endpoint, tx)?;

        let shared = self.shared.clone();
        *dispatcher = Some(runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                shared.handle_event(event);
            }
            debug!("Session dispatcher stopped");
        }));

        info!("Connecting to {}", self.endpoint);
        Ok(())
    }

    /// Processes one transport event synchronously, exactly as the
    /// dispatcher would.
    pub fn handle_event(&self, event: TransportEvent) {
        self.shared.handle_event(event);
    }

    /// Tears the session down. Idempotent, safe before `connect`, and never
    /// fails: transport errors are logged and dropped.
    pub fn disconnect(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            debug!("Session already disconnected");
            return;
        }

        if let Err(e) = self.transport.disconnect() {
            warn!("Ignoring transport error during disconnect: {e}");
        }
        if let Some(handle) = lock(&self.dispatcher).take() {
            handle.abort();
        }

        let previous = std::mem::replace(
            &mut *lock(&self.shared.status),
            ConnectionStatus::Disconnected,
        );
        if previous == ConnectionStatus::Connected {
            for listener in self.shared.snapshot() {
                listener.on_disconnected("client shutdown");
            }
        }
        info!("Disconnected from {}", self.endpoint);
    }
}

impl fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("endpoint", &self.endpoint)
            .field("base_prefix", &self.base_prefix)
            .field("status", &self.status())
            .finish()
    }
}
