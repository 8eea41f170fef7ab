use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("Invalid {name} value {value:?}: expected a positive integer")]
    InvalidNumber {
        name: &'static str,
        value: String,
    },

    #[error("Failed to load configuration: {0}")]
    Source(#[from] config::ConfigError),
}

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Failed to create Kafka client: {0}")]
    ClientCreation(String),

    #[error("Failed to subscribe to topic {topic}: {message}")]
    Subscription {
        topic: String,
        message: String,
    },

    #[error("Failed to produce message: {0}")]
    Send(String),

    #[error("Failed to receive message: {0}")]
    Receive(String),
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Invalid histogram buckets for {metric}: {message}")]
    Buckets {
        metric: &'static str,
        message: String,
    },
}
