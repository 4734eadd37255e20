use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes the broker endpoint, the topic namespace and client identity.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub topics: TopicSettings,
    pub client: ClientSettings,
}

/// Which wire protocol the client speaks to the broker.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Mqtt,
    Websocket,
}

/// Where the broker lives and how the connection is kept alive.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
    pub reconnect_delay_ms: u64,
    pub transport: TransportKind,
}

impl BrokerSettings {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Topic namespace shared by publishers and followers.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TopicSettings {
    pub base_prefix: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClientSettings {
    /// Empty means "generate one per run".
    pub client_id: String,
    pub log_level: String,
}

impl ClientSettings {
    pub fn resolved_client_id(&self) -> String {
        let id = self.client_id.trim();
        if id.is_empty() {
            format!("hashtag-feed-{}", uuid::Uuid::new_v4().simple())
        } else {
            id.to_string()
        }
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub topics: Option<PartialTopicSettings>,
    pub client: Option<PartialClientSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub keep_alive_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub reconnect_delay_ms: Option<u64>,
    pub transport: Option<TransportKind>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialTopicSettings {
    pub base_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialClientSettings {
    pub client_id: Option<String>,
    pub log_level: Option<String>,
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge_over(self, defaults: Settings) -> Settings {
        let broker = self.broker.unwrap_or_default();
        let topics = self.topics.unwrap_or_default();
        let client = self.client.unwrap_or_default();

        Settings {
            broker: BrokerSettings {
                host: broker.host.unwrap_or(defaults.broker.host),
                port: broker.port.unwrap_or(defaults.broker.port),
                keep_alive_secs: broker
                    .keep_alive_secs
                    .unwrap_or(defaults.broker.keep_alive_secs),
                connect_timeout_secs: broker
                    .connect_timeout_secs
                    .unwrap_or(defaults.broker.connect_timeout_secs),
                reconnect_delay_ms: broker
                    .reconnect_delay_ms
                    .unwrap_or(defaults.broker.reconnect_delay_ms),
                transport: broker.transport.unwrap_or(defaults.broker.transport),
            },
            topics: TopicSettings {
                base_prefix: topics.base_prefix.unwrap_or(defaults.topics.base_prefix),
            },
            client: ClientSettings {
                client_id: client.client_id.unwrap_or(defaults.client.client_id),
                log_level: client.log_level.unwrap_or(defaults.client.log_level),
            },
        }
    }
}

/// Provides default values for `Settings`.
///
/// These match the public test broker and the namespace both the poster
/// and the follower agree on.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                host: "test.mosquitto.org".to_string(),
                port: 1883,
                keep_alive_secs: 60,
                connect_timeout_secs: 10,
                reconnect_delay_ms: 1000,
                transport: TransportKind::Mqtt,
            },
            topics: TopicSettings {
                base_prefix: "class/mqtt_twitter/hashtags".to_string(),
            },
            client: ClientSettings {
                client_id: String::new(),
                log_level: "info".to_string(),
            },
        }
    }
}
