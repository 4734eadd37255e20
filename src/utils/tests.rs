use super::error::{InvalidTopic, PublishError, SubscribeError, TransportError};
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn parse_level_falls_back_to_info() {
    assert_eq!(logging::parse_level("WARNING"), tracing::Level::WARN);
    assert_eq!(logging::parse_level(" trace "), tracing::Level::TRACE);
    assert_eq!(logging::parse_level("verbose"), tracing::Level::INFO);
}

#[test]
fn invalid_topic_display_mentions_input() {
    let err = InvalidTopic { raw: "#".into() };
    assert!(err.to_string().contains("\"#\""));
}

#[test]
fn publish_error_wraps_sources() {
    let err: PublishError = TransportError::NotConnected.into();
    assert_eq!(err, PublishError::Transport(TransportError::NotConnected));
    assert_eq!(err.to_string(), "publish failed: not connected to broker");

    let err: PublishError = InvalidTopic { raw: " ".into() }.into();
    assert!(matches!(err, PublishError::InvalidTopic(_)));
}

#[test]
fn subscribe_error_is_std_error() {
    let err: Box<dyn std::error::Error> =
        Box::new(SubscribeError::Transport(TransportError::Closed));
    assert_eq!(
        err.to_string(),
        "subscription change failed: transport has been shut down"
    );
}
