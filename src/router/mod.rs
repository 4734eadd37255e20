//! Message router
//!
//! Forwards inbound transport messages to a registered sink, but only those
//! whose topic equals the current topic of interest exactly.

pub mod routing;

pub use routing::{InboundMessage, MessageRouter, MessageSink, decode_payload};
