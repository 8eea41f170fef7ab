use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::KafkaSettings;
use crate::web::ReadinessProbe;

const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

/// Reports ready when broker metadata can be fetched, and, if a readiness
/// topic is configured, when its partition 0 has a leader.
#[derive(Debug, Clone)]
pub struct KafkaReadinessProbe {
    brokers: Option<String>,
    topic: Option<String>,
    timeout: Duration,
}

impl KafkaReadinessProbe {
    pub fn new(brokers: Option<String>, topic: Option<String>) -> Self {
        Self {
            brokers,
            topic,
            timeout: METADATA_TIMEOUT,
        }
    }

    pub fn from_settings(config: &KafkaSettings) -> Self {
        Self::new(Some(config.brokers.clone()), config.readiness_topic.clone())
    }

    fn check_blocking(brokers: &str, topic: Option<&str>, timeout: Duration) -> Result<(), String> {
        let client: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()
            .map_err(|e| e.to_string())?;

        let metadata = client
            .fetch_metadata(topic, timeout)
            .map_err(|e| e.to_string())?;

        let Some(topic) = topic else {
            return Ok(());
        };
        let entry = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| format!("topic {topic} missing from metadata"))?;
        if let Some(err) = entry.error() {
            return Err(format!("topic {topic} unavailable: {err:?}"));
        }
        match entry.partitions().iter().find(|p| p.id() == 0) {
            Some(partition) if partition.leader() >= 0 => Ok(()),
            _ => Err(format!("topic {topic} partition 0 has no leader")),
        }
    }
}

impl ReadinessProbe for KafkaReadinessProbe {
    async fn is_ready(&self) -> bool {
        let Some(brokers) = self.brokers.clone().filter(|b| !b.is_empty()) else {
            debug!("Readiness check failed: no brokers configured");
            return false;
        };
        let topic = self.topic.clone();
        let timeout = self.timeout;

        let result = tokio::task::spawn_blocking(move || {
            Self::check_blocking(&brokers, topic.as_deref(), timeout)
        })
        .await;

        match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Readiness check failed: {}", e);
                false
            }
            Err(e) => {
                warn!("Readiness check task failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn not_ready_without_brokers() {
        assert!(!KafkaReadinessProbe::new(None, None).is_ready().await);
        assert!(!KafkaReadinessProbe::new(Some(String::new()), None).is_ready().await);
    }

    #[tokio::test]
    async fn not_ready_when_broker_unreachable() {
        let probe = KafkaReadinessProbe {
            brokers: Some("127.0.0.1:1".to_string()),
            topic: Some("probe".to_string()),
            timeout: Duration::from_millis(500),
        };
        assert!(!probe.is_ready().await);
    }
}
