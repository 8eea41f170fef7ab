use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::num::{NonZeroU32, NonZeroU64};

use crate::error::ConfigError;
use crate::pipeline::MessageRate;

pub const DEFAULT_GROUP_ID: &str = "my-consumer-group";

/// Validated runtime settings shared by the producer and consumer roles.
#[derive(Debug, Clone)]
pub struct Settings {
    pub kafka: KafkaSettings,
    pub rate: MessageRate,
    pub max_messages: Option<NonZeroU64>,
}

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic: String,
    pub readiness_topic: Option<String>,
    pub group_id: String,
}

// Everything arrives as an optional string so that presence and numeric
// validity are checked in one place.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    kafka_brokers: Option<String>,
    kafka_topic: Option<String>,
    kafka_topic_test: Option<String>,
    kafka_group_id: Option<String>,
    messages_per_second: Option<String>,
    max_messages: Option<String>,
    num_messages: Option<String>,
}

impl Settings {
    /// Loads settings from an optional config file overlaid by the process
    /// environment.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        Self::from_builder(builder.add_source(Environment::default()))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let raw: RawSettings = builder.build()?.try_deserialize()?;
        raw.validate()
    }
}

impl RawSettings {
    fn validate(self) -> Result<Settings, ConfigError> {
        let brokers = required("KAFKA_BROKERS", self.kafka_brokers)?;
        let topic = required("KAFKA_TOPIC", self.kafka_topic)?;
        let rate = required("MESSAGES_PER_SECOND", self.messages_per_second)?;
        let rate = MessageRate::new(parse_positive::<NonZeroU32>("MESSAGES_PER_SECOND", &rate)?);

        let max_messages = match (non_empty(self.max_messages), non_empty(self.num_messages)) {
            (Some(value), _) => Some(parse_positive::<NonZeroU64>("MAX_MESSAGES", &value)?),
            (None, Some(value)) => Some(parse_positive::<NonZeroU64>("NUM_MESSAGES", &value)?),
            (None, None) => None,
        };

        Ok(Settings {
            kafka: KafkaSettings {
                brokers,
                topic,
                readiness_topic: non_empty(self.kafka_topic_test),
                group_id: non_empty(self.kafka_group_id)
                    .unwrap_or_else(|| DEFAULT_GROUP_ID.to_string()),
            },
            rate,
            max_messages,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::Missing(name))
}

fn parse_positive<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings_from(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_builder(
            config::Config::builder().add_source(Environment::default().source(Some(map))),
        )
    }

    const BASE: [(&str, &str); 3] = [
        ("KAFKA_BROKERS", "localhost:9092"),
        ("KAFKA_TOPIC", "my-kafka-topic"),
        ("MESSAGES_PER_SECOND", "20"),
    ];

    #[test]
    fn parses_required_settings() {
        let settings = settings_from(&BASE).unwrap();

        assert_eq!(settings.kafka.brokers, "localhost:9092");
        assert_eq!(settings.kafka.topic, "my-kafka-topic");
        assert_eq!(settings.kafka.group_id, DEFAULT_GROUP_ID);
        assert_eq!(settings.kafka.readiness_topic, None);
        assert_eq!(settings.rate.interval(), Duration::from_millis(50));
        assert!(settings.max_messages.is_none());
    }

    #[test]
    fn missing_brokers_is_rejected() {
        let err = settings_from(&BASE[1..]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("KAFKA_BROKERS")));

        let mut vars = BASE.to_vec();
        vars[0].1 = "  ";
        let err = settings_from(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("KAFKA_BROKERS")));
    }

    #[test]
    fn zero_or_non_numeric_rate_is_rejected() {
        for bad in ["0", "fast", "-3", "1.5"] {
            let mut vars = BASE.to_vec();
            vars[2].1 = bad;
            let err = settings_from(&vars).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidNumber { name: "MESSAGES_PER_SECOND", .. }),
                "rate {bad:?} accepted"
            );
        }
    }

    #[test]
    fn message_bound_is_validated() {
        let mut vars = BASE.to_vec();
        vars.push(("NUM_MESSAGES", "abc"));
        let err = settings_from(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: "NUM_MESSAGES", .. }));

        let mut vars = BASE.to_vec();
        vars.push(("MAX_MESSAGES", "0"));
        let err = settings_from(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { name: "MAX_MESSAGES", .. }));
    }

    #[test]
    fn max_messages_takes_precedence() {
        let mut vars = BASE.to_vec();
        vars.push(("NUM_MESSAGES", "5"));
        let settings = settings_from(&vars).unwrap();
        assert_eq!(settings.max_messages.map(NonZeroU64::get), Some(5));

        vars.push(("MAX_MESSAGES", "7"));
        let settings = settings_from(&vars).unwrap();
        assert_eq!(settings.max_messages.map(NonZeroU64::get), Some(7));
    }

    #[test]
    fn optional_kafka_settings_are_read() {
        let mut vars = BASE.to_vec();
        vars.push(("KAFKA_TOPIC_TEST", "readiness"));
        vars.push(("KAFKA_GROUP_ID", "pacers"));
        let settings = settings_from(&vars).unwrap();

        assert_eq!(settings.kafka.readiness_topic.as_deref(), Some("readiness"));
        assert_eq!(settings.kafka.group_id, "pacers");
    }
}
