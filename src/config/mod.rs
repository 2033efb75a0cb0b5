mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    Backend, BrokerSettings, LogSettings, PublisherSettings, Settings, TopicSettings,
};

/// Loads the configuration from `path`, or from `config/default` (if
/// present) when no path is given, then applies `LINEPUB_*` environment
/// variables, all merged over default values. An explicitly named file must
/// exist.
///
/// Environment variables use `__` between sections and keys, for example
/// `LINEPUB_PUBLISHER__MAX_RETRIES=5`.
pub fn load_config_from(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name("config/default").required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix("LINEPUB")
            .prefix_separator("_")
            .separator("__"),
    );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let settings = partial.merge(Settings::default());

    validate(&settings)?;
    Ok(settings)
}

/// Rejects values the publisher cannot run with.
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.topic.name.trim().is_empty() {
        return Err(ConfigError::Message("topic.name must not be empty".into()));
    }
    if settings.topic.partitions == 0 {
        return Err(ConfigError::Message(
            "topic.partitions must be at least 1".into(),
        ));
    }
    if settings.topic.replication_factor == 0 {
        return Err(ConfigError::Message(
            "topic.replication_factor must be at least 1".into(),
        ));
    }
    if settings.broker.queue_capacity == 0 {
        return Err(ConfigError::Message(
            "broker.queue_capacity must be at least 1".into(),
        ));
    }
    if settings.broker.brokers.trim().is_empty() {
        return Err(ConfigError::Message("broker.brokers must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
