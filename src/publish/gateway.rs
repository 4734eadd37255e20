use std::sync::Arc;

use tracing::info;

use super::message::{OutboundMessage, PublishedReceipt};
use crate::topic::canonicalize;
use crate::transport::Transport;
use crate::utils::PublishError;

pub struct PublishGateway {
    transport: Arc<dyn Transport>,
    base_prefix: String,
}

impl PublishGateway {
    pub fn new(transport: Arc<dyn Transport>, base_prefix: impl Into<String>) -> Self {
        Self {
            transport,
            base_prefix: base_prefix.into(),
        }
    }

    /// Validates the inputs without touching the transport.
    ///
    /// Sender and body are trimmed; an empty body is allowed.
    pub fn prepare(
        &self,
        sender: &str,
        body: &str,
        raw_topic: &str,
    ) -> Result<OutboundMessage, PublishError> {
        let sender = sender.trim();
        if sender.is_empty() {
            return Err(PublishError::MissingSender);
        }
        let tag = canonicalize(raw_topic)?;

        Ok(OutboundMessage {
            sender_id: sender.to_string(),
            body: body.trim().to_string(),
            topic: tag.under(&self.base_prefix),
        })
    }

    /// Sends one tweet. A transport failure is returned as is; nothing is
    /// retried.
    pub fn publish(
        &self,
        sender: &str,
        body: &str,
        raw_topic: &str,
    ) -> Result<PublishedReceipt, PublishError> {
        let message = self.prepare(sender, body, raw_topic)?;
        let payload = message.payload();

        self.transport.publish(&message.topic, payload.as_bytes())?;
        info!("{} published to {}", message.sender_id, message.topic);

        Ok(PublishedReceipt {
            topic: message.topic,
            payload,
        })
    }
}

impl std::fmt::Debug for PublishGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishGateway")
            .field("base_prefix", &self.base_prefix)
            .finish()
    }
}
