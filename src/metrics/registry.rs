use metrics::{Counter, Histogram, Key, KeyName, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::error::MetricsError;

/// Exponential buckets 0.01 * 10^n, n = 0..5.
const DURATION_BUCKETS: [f64; 5] = [0.01, 0.1, 1.0, 10.0, 100.0];

/// Names and help texts of the three series each role exports.
#[derive(Debug, Clone, Copy)]
pub struct MetricNames {
    pub handled: &'static str,
    pub handled_help: &'static str,
    pub failed: &'static str,
    pub failed_help: &'static str,
    pub duration: &'static str,
    pub duration_help: &'static str,
}

pub const PRODUCER_METRICS: MetricNames = MetricNames {
    handled: "messages_produced_total",
    handled_help: "Total number of messages produced",
    failed: "message_production_errors_total",
    failed_help: "Total number of messages that failed to produce",
    duration: "message_production_duration_seconds",
    duration_help: "Time taken to produce a message",
};

pub const CONSUMER_METRICS: MetricNames = MetricNames {
    handled: "messages_consumed_total",
    handled_help: "Total number of messages consumed",
    failed: "message_consumption_errors_total",
    failed_help: "Total number of consumer errors received",
    duration: "message_consumption_duration_seconds",
    duration_help: "Time taken to receive a message",
};

/// Metric handles for one role, backed by a recorder owned by this value
/// rather than the process-wide one.
#[derive(Clone)]
pub struct RoleMetrics {
    handled: Counter,
    failed: Counter,
    duration: Histogram,
    handle: PrometheusHandle,
}

impl RoleMetrics {
    pub fn new(names: &MetricNames) -> Result<Self, MetricsError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(names.duration.to_string()), &DURATION_BUCKETS)
            .map_err(|e| MetricsError::Buckets {
                metric: names.duration,
                message: e.to_string(),
            })?
            .build_recorder();

        recorder.describe_counter(
            KeyName::from_const_str(names.handled),
            None,
            SharedString::const_str(names.handled_help),
        );
        recorder.describe_counter(
            KeyName::from_const_str(names.failed),
            None,
            SharedString::const_str(names.failed_help),
        );
        recorder.describe_histogram(
            KeyName::from_const_str(names.duration),
            Some(Unit::Seconds),
            SharedString::const_str(names.duration_help),
        );

        let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));
        Ok(Self {
            handled: recorder.register_counter(&Key::from_static_name(names.handled), &metadata),
            failed: recorder.register_counter(&Key::from_static_name(names.failed), &metadata),
            duration: recorder
                .register_histogram(&Key::from_static_name(names.duration), &metadata),
            handle: recorder.handle(),
        })
    }

    pub fn record_success(&self, elapsed: Duration) {
        self.handled.increment(1);
        self.duration.record(elapsed.as_secs_f64());
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.failed.increment(1);
        self.duration.record(elapsed.as_secs_f64());
    }

    /// Prometheus text exposition of the current values.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
