//! Static configuration: broker endpoint, topic prefix and client identity.
//!
//! Values are layered: built-in defaults, then an optional
//! `config/default.*` file, then `HASHTAG_FEED_*` environment variables
//! (`__` separates sections, e.g. `HASHTAG_FEED_BROKER__PORT=1884`).

mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, ClientSettings, Settings, TopicSettings, TransportKind};

/// Environment variable prefix recognised by `load_config`.
pub const ENV_PREFIX: &str = "HASHTAG_FEED";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as `load_config`, reading the optional file at `path` (extension
/// resolved by the `config` crate).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_over(Settings::default()))
}
