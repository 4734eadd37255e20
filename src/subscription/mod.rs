//! Subscription state
//!
//! Single-slot state machine for the topic a session follows:
//!
//! ```text
//! Idle ──request_subscribe(tag)──▶ Following(topic)
//! Following(a) ──request_subscribe(tag)──▶ Following(b)   (a is not unsubscribed)
//! Following(t) ──request_unsubscribe()──▶ Idle
//! Following(t) ──on_reconnected()──▶ Following(t)          (subscribe(t) re-issued)
//! Idle ──request_unsubscribe() / on_reconnected()──▶ Idle  (no-op)
//! ```
//!
//! Every transition happens under one lock, together with the transport
//! call it implies, so a user request and a reconnect-driven resubscribe can
//! never interleave.

pub mod state;

pub use state::{SubscriptionSlot, SubscriptionState, TopicEvent};
