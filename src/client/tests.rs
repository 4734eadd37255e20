use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use super::pubsub_client::{ClientEvent, TweetClient};
use crate::config::Settings;
use crate::session::ConnectionStatus;
use crate::subscription::TopicEvent;
use crate::topic::canonicalize;
use crate::transport::TransportEvent;
use crate::transport::testing::{Call, RecordingTransport};
use crate::utils::{PublishError, TransportError};

const SPORTS: &str = "class/mqtt_twitter/hashtags/Sports";

fn client() -> (
    Arc<RecordingTransport>,
    TweetClient,
    UnboundedReceiver<ClientEvent>,
) {
    let transport = Arc::new(RecordingTransport::new());
    let (client, events) = TweetClient::new("user1-ui", &Settings::default(), transport.clone());
    (transport, client, events)
}

fn status(status: ConnectionStatus, reason: Option<&str>) -> ClientEvent {
    ClientEvent::Status {
        status,
        endpoint: "test.mosquitto.org:1883".into(),
        reason: reason.map(str::to_string),
    }
}

#[test]
fn test_client_new() {
    let (transport, client, mut events) = client();
    assert_eq!(client.id(), "user1-ui");
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert_eq!(client.active_topic(), None);
    assert!(transport.calls().is_empty());
    assert!(events.try_recv().is_err());
}

#[test]
fn test_publish_goes_through_gateway() {
    let (transport, client, _events) = client();

    let receipt = client.publish("user1", "Hello MQTT!", "#Sports").unwrap();
    assert_eq!(receipt.topic, SPORTS);
    assert_eq!(
        transport.calls(),
        vec![Call::Publish(SPORTS.into(), b"user1: Hello MQTT!".to_vec())]
    );

    assert_eq!(
        client.publish("  ", "hi", "#Sports"),
        Err(PublishError::MissingSender)
    );
}

#[test]
fn test_topic_changes_are_reported() {
    let (_transport, client, mut events) = client();

    client.request_subscribe("#Sports").unwrap();
    assert_eq!(
        events.try_recv().unwrap(),
        ClientEvent::Topic(TopicEvent::Subscribed {
            tag: canonicalize("Sports").unwrap(),
            topic: SPORTS.into(),
        })
    );

    client.request_unsubscribe().unwrap();
    assert_eq!(
        events.try_recv().unwrap(),
        ClientEvent::Topic(TopicEvent::Unsubscribed {
            topic: SPORTS.into()
        })
    );

    // Nothing to leave, nothing to report.
    assert_eq!(client.request_unsubscribe().unwrap(), None);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_failed_subscribe_reports_nothing() {
    let (transport, client, mut events) = client();
    transport.fail_with(Some(TransportError::NotConnected));

    assert!(client.request_subscribe("#Sports").is_err());
    assert_eq!(client.active_topic(), None);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_status_and_messages_follow_session_events() {
    let (transport, client, mut events) = client();
    client.request_subscribe("Sports").unwrap();
    let _ = events.try_recv();
    transport.clear();

    client.session().handle_event(TransportEvent::Connected);
    assert_eq!(
        events.try_recv().unwrap(),
        status(ConnectionStatus::Connected, None)
    );
    // Connected always re-issues the followed topic.
    assert_eq!(transport.calls(), vec![Call::Subscribe(SPORTS.into())]);

    client.session().handle_event(TransportEvent::Message {
        topic: "class/mqtt_twitter/hashtags/News".into(),
        payload: b"user2: ignored".to_vec(),
    });
    client.session().handle_event(TransportEvent::Message {
        topic: SPORTS.into(),
        payload: b"user2: goal!".to_vec(),
    });
    match events.try_recv().unwrap() {
        ClientEvent::Message(message) => {
            assert_eq!(message.topic, SPORTS);
            assert_eq!(message.text, "user2: goal!");
        }
        other => panic!("expected a routed message, got {other:?}"),
    }

    client.session().handle_event(TransportEvent::Disconnected {
        reason: "network down".into(),
    });
    assert_eq!(
        events.try_recv().unwrap(),
        status(ConnectionStatus::Disconnected, Some("network down"))
    );
    assert!(events.try_recv().is_err());
}

#[test]
fn test_shutdown_leaves_topic_and_is_idempotent() {
    let (transport, client, mut events) = client();
    client.session().handle_event(TransportEvent::Connected);
    client.request_subscribe("Sports").unwrap();
    transport.clear();

    client.shutdown();
    client.shutdown();

    assert_eq!(
        transport.calls(),
        vec![Call::Unsubscribe(SPORTS.into()), Call::Disconnect]
    );
    assert_eq!(client.status(), ConnectionStatus::Disconnected);

    let reported: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        reported.last(),
        Some(&status(ConnectionStatus::Disconnected, Some("client shutdown")))
    );
}

#[test]
fn test_shutdown_ignores_transport_failures() {
    let (transport, client, _events) = client();
    client.request_subscribe("Sports").unwrap();
    transport.fail_with(Some(TransportError::NotConnected));

    client.shutdown();
    assert!(client.session().is_closed());
}
