pub mod health;

use std::future::Future;

pub use health::HealthServer;

/// Broker-side readiness check injected into the HTTP layer.
pub trait ReadinessProbe: Send + Sync + 'static {
    fn is_ready(&self) -> impl Future<Output = bool> + Send;
}
