use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use super::mqtt::MqttTransport;
use super::{BrokerEndpoint, EventReceiver, Transport, TransportEvent};
use crate::utils::{ConnectionError, TransportError};

const CONNECT: u8 = 0x10;
const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
const PUBLISH: u8 = 0x30;
const SUBSCRIBE: u8 = 0x82;
const UNSUBSCRIBE: u8 = 0xA2;
const DISCONNECT: u8 = 0xE0;

/// One MQTT control packet as seen by the fake broker.
#[derive(Debug, Clone)]
struct Packet {
    kind: u8,
    body: Vec<u8>,
}

impl Packet {
    fn carries(&self, needle: &[u8]) -> bool {
        self.body.windows(needle.len()).any(|w| w == needle)
    }
}

async fn read_packet(stream: &mut TcpStream) -> Option<Packet> {
    let kind = stream.read_u8().await.ok()?;
    let mut remaining = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.ok()?;
        remaining |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0u8; remaining];
    stream.read_exact(&mut body).await.ok()?;
    Some(Packet { kind, body })
}

fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![PUBLISH, (2 + topic.len() + payload.len()) as u8];
    packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// Accepts one client, acknowledges its CONNECT and reports every later
/// packet. Subscriptions are acknowledged and answered with one publish on
/// the subscribed topic. Hangs up after DISCONNECT.
async fn fake_broker(listener: TcpListener, seen: mpsc::UnboundedSender<Packet>) {
    let (mut stream, _) = listener.accept().await.unwrap();
    let connect = read_packet(&mut stream).await.expect("CONNECT");
    assert_eq!(connect.kind, CONNECT);
    stream.write_all(&CONNACK).await.unwrap();

    while let Some(packet) = read_packet(&mut stream).await {
        match packet.kind {
            SUBSCRIBE => {
                let pkid = [packet.body[0], packet.body[1]];
                // Replies may race the client's DISCONNECT; losing them is fine.
                let _ = stream
                    .write_all(&[0x90, 0x03, pkid[0], pkid[1], 0x00])
                    .await;
                let _ = stream
                    .write_all(&publish_packet("feeds/Sports", b"user2: goal!"))
                    .await;
            }
            UNSUBSCRIBE => {
                let pkid = [packet.body[0], packet.body[1]];
                let _ = stream.write_all(&[0xB0, 0x02, pkid[0], pkid[1]]).await;
            }
            _ => {}
        }
        let done = packet.kind == DISCONNECT;
        let _ = seen.send(packet);
        if done {
            break;
        }
    }
}

async fn bind() -> (TcpListener, BrokerEndpoint) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Can't bind");
    let port = listener.local_addr().unwrap().port();
    let mut endpoint = BrokerEndpoint::new("127.0.0.1", port);
    endpoint.connect_timeout = Duration::from_secs(1);
    endpoint.reconnect_delay = Duration::from_millis(50);
    (listener, endpoint)
}

async fn next_event(rx: &mut EventReceiver) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

async fn next_packet(rx: &mut mpsc::UnboundedReceiver<Packet>) -> Packet {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for packet")
        .expect("broker stopped")
}

#[tokio::test]
async fn test_mqtt_requests_reach_the_broker() {
    let (listener, endpoint) = bind().await;
    let (seen_tx, mut seen) = mpsc::unbounded_channel();
    tokio::spawn(fake_broker(listener, seen_tx));

    let transport = MqttTransport::new("follower-1");
    let (tx, mut rx) = mpsc::unbounded_channel();
    transport.connect(&endpoint, tx).unwrap();
    assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);

    transport.subscribe("feeds/Sports").unwrap();
    let packet = next_packet(&mut seen).await;
    assert_eq!(packet.kind, SUBSCRIBE);
    assert!(packet.carries(b"feeds/Sports"));

    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Message {
            topic: "feeds/Sports".into(),
            payload: b"user2: goal!".to_vec(),
        }
    );

    transport.publish("feeds/News", b"user1: hello").unwrap();
    let packet = next_packet(&mut seen).await;
    assert_eq!(packet.kind, PUBLISH);
    assert!(packet.carries(b"feeds/News"));
    assert!(packet.carries(b"user1: hello"));

    transport.disconnect().unwrap();
}

#[tokio::test]
async fn test_mqtt_disconnect_flushes_queued_requests() {
    for round in 0..5 {
        let (listener, endpoint) = bind().await;
        let (seen_tx, mut seen) = mpsc::unbounded_channel();
        let broker = tokio::spawn(fake_broker(listener, seen_tx));

        let transport = MqttTransport::new(format!("follower-{round}"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.connect(&endpoint, tx).unwrap();
        assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);

        // Queued back to back, as a shutdown right after following does.
        transport.subscribe("feeds/Sports").unwrap();
        transport.unsubscribe("feeds/Sports").unwrap();
        transport.disconnect().unwrap();

        tokio::time::timeout(Duration::from_secs(5), broker)
            .await
            .expect("broker never saw DISCONNECT")
            .unwrap();
        let mut kinds = Vec::new();
        while let Ok(packet) = seen.try_recv() {
            kinds.push(packet.kind);
        }
        assert_eq!(
            kinds,
            vec![SUBSCRIBE, UNSUBSCRIBE, DISCONNECT],
            "round {round}"
        );
        assert_eq!(transport.subscribe("feeds/Sports"), Err(TransportError::Closed));
    }
}

#[tokio::test]
async fn test_mqtt_connect_timeout_is_configured() {
    let (listener, endpoint) = bind().await;
    // Accepts the TCP connection but never answers CONNECT.
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let transport = MqttTransport::new("slow-broker");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let started = Instant::now();
    transport.connect(&endpoint, tx).unwrap();

    assert!(matches!(
        next_event(&mut rx).await,
        TransportEvent::Disconnected { .. }
    ));
    let waited = started.elapsed();
    assert!(waited < Duration::from_secs(3), "waited {waited:?}");

    transport.disconnect().unwrap();
}

#[tokio::test]
async fn test_mqtt_requests_fail_outside_a_connection() {
    let (listener, endpoint) = bind().await;
    drop(listener);

    let transport = MqttTransport::new("offline");
    assert_eq!(
        transport.publish("feeds/Sports", b"x"),
        Err(TransportError::NotConnected)
    );

    let (tx, _rx) = mpsc::unbounded_channel();
    transport.connect(&endpoint, tx).unwrap();
    assert_eq!(
        transport.subscribe("feeds/Sports"),
        Err(TransportError::NotConnected)
    );

    transport.disconnect().unwrap();
    transport.disconnect().unwrap();
    assert_eq!(
        transport.unsubscribe("feeds/Sports"),
        Err(TransportError::Closed)
    );
    let (tx, _rx) = mpsc::unbounded_channel();
    assert_eq!(transport.connect(&endpoint, tx), Err(ConnectionError::Closed));
}
