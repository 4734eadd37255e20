//! Error types shared by every component of the hashtag feed.
//!
//! Validation errors (`InvalidTopic`, `PublishError::MissingSender`) are
//! raised before any transport call is attempted. Transport failures are
//! returned synchronously from the call that triggered them. They are only
//! swallowed during teardown and automatic resubscription, and logged there.

use thiserror::Error;

/// A hashtag that is empty once surrounding whitespace and a single leading
/// `#` are removed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hashtag {raw:?}: enter a hashtag like #Sports")]
pub struct InvalidTopic {
    /// The raw text as the user typed it.
    pub raw: String,
}

/// Failure to start a connection attempt.
///
/// Only failures detected before any network I/O surface here. Whether the
/// broker was actually reached is reported later through lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("invalid broker endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("could not set up transport: {0}")]
    Setup(String),

    #[error("connection already started")]
    AlreadyStarted,

    #[error("session has been shut down")]
    Closed,
}

/// Failure of a single publish/subscribe/unsubscribe call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not connected to broker")]
    NotConnected,

    #[error("transport has been shut down")]
    Closed,

    #[error("transport rejected request: {0}")]
    Rejected(String),

    #[error("could not encode frame: {0}")]
    Encode(String),
}

impl From<rumqttc::ClientError> for TransportError {
    fn from(err: rumqttc::ClientError) -> Self {
        TransportError::Rejected(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Encode(err.to_string())
    }
}

/// Errors returned by `PublishGateway::publish`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("missing sender: enter a username")]
    MissingSender,

    #[error(transparent)]
    InvalidTopic(#[from] InvalidTopic),

    #[error("publish failed: {0}")]
    Transport(#[from] TransportError),
}

/// Errors returned by subscribe/unsubscribe requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error(transparent)]
    InvalidTopic(#[from] InvalidTopic),

    #[error("subscription change failed: {0}")]
    Transport(#[from] TransportError),
}
