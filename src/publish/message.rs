//! Outbound message definitions
//!
//! Both values are ephemeral: built for one publish call and dropped after.
//!
//! Wire format of the payload: UTF-8 text `"{sender}: {body}"`.

/// A validated tweet bound for `topic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub sender_id: String,
    pub body: String,
    pub topic: String,
}

impl OutboundMessage {
    pub fn payload(&self) -> String {
        format!("{}: {}", self.sender_id, self.body)
    }
}

/// What was actually sent, echoed back for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedReceipt {
    pub topic: String,
    pub payload: String,
}
