//! Connection session
//!
//! `ConnectionSession` owns one actor's transport, drives its background
//! event stream, tracks connected/disconnected status and fans lifecycle and
//! inbound-message events out to registered `SessionListener`s.

pub mod connection;

pub use connection::{ConnectionSession, ConnectionStatus, SessionListener};
