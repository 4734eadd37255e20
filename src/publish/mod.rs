//! Publish gateway
//!
//! Validates an outbound tweet and forwards it to the fully-qualified topic
//! of its hashtag. Validation failures never reach the transport.

pub mod gateway;
pub mod message;

pub use gateway::PublishGateway;
pub use message::{OutboundMessage, PublishedReceipt};
