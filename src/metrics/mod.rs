pub mod registry;

pub use registry::{RoleMetrics, CONSUMER_METRICS, PRODUCER_METRICS};
