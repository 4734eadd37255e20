//! The `client` module is the surface a user interface drives.
//!
//! `TweetClient` bundles one broker session with the subscription slot, the
//! publish path and the inbound router, and reports status changes, topic
//! changes and routed messages as `ClientEvent`s.

pub mod pubsub_client;
pub use pubsub_client::{ClientEvent, TweetClient};

#[cfg(test)]
mod tests;
