use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::time::Duration;
use tracing::info;

use crate::config::KafkaSettings;
use crate::error::BrokerError;
use crate::pipeline::{InboundMessage, MessageSource};

pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaConsumer {
    /// Creates the consumer and subscribes it to the configured topic.
    pub fn subscribe(config: &KafkaSettings) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| BrokerError::ClientCreation(e.to_string()))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| BrokerError::Subscription {
                topic: config.topic.clone(),
                message: e.to_string(),
            })?;

        info!(
            "Subscribed to topic {} as group {}",
            config.topic, config.group_id
        );
        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }
}

impl MessageSource for KafkaConsumer {
    async fn poll(&mut self, timeout: Duration) -> Option<Result<InboundMessage, BrokerError>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => None,
            Ok(Ok(msg)) => Some(Ok(InboundMessage {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
                key: msg.key().map(<[u8]>::to_vec),
                payload: msg.payload().map(<[u8]>::to_vec),
            })),
            Ok(Err(e)) => Some(Err(BrokerError::Receive(e.to_string()))),
        }
    }

    async fn close(self) {
        self.consumer.unsubscribe();
        info!("Unsubscribed from topic {}", self.topic);
    }
}
