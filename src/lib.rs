//! # hashtag-feed
//!
//! `hashtag_feed` is a hashtag-based microblogging client that rides on a
//! topic-based publish/subscribe broker. Users post short text messages
//! under a hashtag and follow one hashtag at a time to see everything
//! posted under it.
//!
//! ## Core Modules
//!
//! - `topic`: Canonicalizes hashtags and builds full broker topics.
//! - `session`: One connection to the broker and its lifecycle events.
//! - `subscription`: The single-slot follow state, re-issued on every reconnect.
//! - `publish`: Validates and sends tweets.
//! - `router`: Delivers inbound messages for the followed topic only.
//! - `transport`: The broker boundary with MQTT, WebSocket and in-process backends.
//! - `client`: The facade a user interface drives.
//! - `config`: Loads broker, topic and client settings.
//! - `utils`: Shared error types and logging setup.

pub mod client;
pub mod config;
pub mod publish;
pub mod router;
pub mod session;
pub mod subscription;
pub mod topic;
pub mod transport;
pub mod utils;
