use std::num::NonZeroU64;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::{MessageFeed, MessageSink, Pacer, Shutdown};
use crate::metrics::RoleMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerState {
    Init,
    Sending,
    Draining,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerReport {
    pub attempted: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Sends messages from a feed to a sink at a fixed rate until the bound is
/// reached, the feed runs dry or shutdown fires.
pub struct ProducerLoop<S, F> {
    sink: S,
    feed: F,
    pacer: Pacer,
    metrics: RoleMetrics,
    limit: Option<NonZeroU64>,
    state: ProducerState,
}

impl<S: MessageSink, F: MessageFeed> ProducerLoop<S, F> {
    pub fn new(
        sink: S,
        feed: F,
        pacer: Pacer,
        metrics: RoleMetrics,
        limit: Option<NonZeroU64>,
    ) -> Self {
        Self {
            sink,
            feed,
            pacer,
            metrics,
            limit,
            state: ProducerState::Init,
        }
    }

    fn transition(&mut self, next: ProducerState) {
        debug!("Producer state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn limit_reached(&self, attempted: u64) -> bool {
        self.limit.is_some_and(|limit| attempted >= limit.get())
    }

    pub async fn run(mut self, mut shutdown: Shutdown) -> ProducerReport {
        let mut report = ProducerReport::default();
        info!(
            "Producing at {:?} per message, limit {:?}",
            self.pacer.interval(),
            self.limit
        );
        self.transition(ProducerState::Sending);

        loop {
            if shutdown.is_triggered() {
                info!("Shutdown requested, stopping producer");
                break;
            }
            if self.limit_reached(report.attempted) {
                break;
            }

            let next = tokio::select! {
                next = self.feed.next_message() => next,
                _ = shutdown.wait() => {
                    info!("Shutdown requested while waiting for input, stopping producer");
                    break;
                }
            };
            let message = match next {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!("Message input exhausted");
                    break;
                }
                Err(e) => {
                    error!("Failed to read message input: {}", e);
                    break;
                }
            };
            if shutdown.is_triggered() {
                info!("Shutdown requested, dropping unsent message");
                break;
            }

            report.attempted += 1;
            let started = Instant::now();
            match self.sink.send(message).await {
                Ok(()) => {
                    report.delivered += 1;
                    self.metrics.record_success(started.elapsed());
                    debug!("Produced message {}", report.attempted);
                }
                Err(e) => {
                    report.failed += 1;
                    self.metrics.record_failure(started.elapsed());
                    warn!("{}", e);
                }
            }

            // No wait after the final bounded send.
            if self.limit_reached(report.attempted) {
                break;
            }
            if !self.pacer.pause(&mut shutdown).await {
                info!("Shutdown requested, stopping producer");
                break;
            }
        }

        self.transition(ProducerState::Draining);
        self.sink.close().await;
        // `close` consumed the sink field, so update `state` directly.
        debug!("Producer state {:?} -> {:?}", self.state, ProducerState::Terminated);
        self.state = ProducerState::Terminated;

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Producer finished"
        );
        report
    }
}
