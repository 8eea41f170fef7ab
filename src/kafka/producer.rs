use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::KafkaSettings;
use crate::error::BrokerError;
use crate::pipeline::{MessageSink, OutboundMessage};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
}

impl KafkaProducer {
    pub fn new(config: &KafkaSettings) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .create()
            .map_err(|e| BrokerError::ClientCreation(e.to_string()))?;

        info!("Kafka producer created for topic {}", config.topic);
        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }
}

impl MessageSink for KafkaProducer {
    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        let mut record = FutureRecord::<[u8], [u8]>::to(&self.topic).payload(&message.payload);
        if let Some(key) = &message.key {
            record = record.key(key.as_slice());
        }

        match self.producer.send(record, Timeout::Never).await {
            Ok((partition, offset)) => {
                debug!(
                    "Message on topic {} [{}] @ {}: {}",
                    self.topic,
                    partition,
                    offset,
                    String::from_utf8_lossy(&message.payload)
                );
                Ok(())
            }
            Err((e, _)) => Err(BrokerError::Send(e.to_string())),
        }
    }

    async fn close(self) {
        let producer = self.producer.clone();
        match tokio::task::spawn_blocking(move || producer.flush(FLUSH_TIMEOUT)).await {
            Ok(Ok(())) => info!("Kafka producer flushed"),
            Ok(Err(e)) => error!("Failed to flush Kafka producer: {}", e),
            Err(e) => error!("Kafka producer flush task failed: {}", e),
        }
    }
}
