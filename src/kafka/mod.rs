pub mod consumer;
pub mod producer;
pub mod readiness;

pub use consumer::KafkaConsumer;
pub use producer::KafkaProducer;
pub use readiness::KafkaReadinessProbe;
