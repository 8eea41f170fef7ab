use std::num::NonZeroU64;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{MessageSource, Pacer, Shutdown};
use crate::metrics::RoleMetrics;

/// Poll timeout; bounds how long shutdown can go unnoticed while idle.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsumerState {
    Init,
    Subscribed,
    Polling,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub received: u64,
    pub failed: u64,
}

/// Drains a subscribed source, logging every message and pausing between
/// events to hold the configured rate.
pub struct ConsumerLoop<S> {
    source: S,
    pacer: Pacer,
    metrics: RoleMetrics,
    limit: Option<NonZeroU64>,
    poll_timeout: Duration,
    state: ConsumerState,
}

impl<S: MessageSource> ConsumerLoop<S> {
    /// `source` is expected to be subscribed already, so the loop leaves
    /// `Init` as soon as it is constructed.
    pub fn new(
        source: S,
        pacer: Pacer,
        metrics: RoleMetrics,
        limit: Option<NonZeroU64>,
    ) -> Self {
        let mut consumer = Self {
            source,
            pacer,
            metrics,
            limit,
            poll_timeout: POLL_TIMEOUT,
            state: ConsumerState::Init,
        };
        consumer.transition(ConsumerState::Subscribed);
        consumer
    }

    fn transition(&mut self, next: ConsumerState) {
        debug!("Consumer state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub async fn run(mut self, mut shutdown: Shutdown) -> ConsumerReport {
        let mut report = ConsumerReport::default();
        info!(
            "Consuming at {:?} per message, limit {:?}",
            self.pacer.interval(),
            self.limit
        );
        self.transition(ConsumerState::Polling);

        loop {
            if shutdown.is_triggered() {
                info!("Shutdown requested, stopping consumer");
                break;
            }
            if self
                .limit
                .is_some_and(|limit| report.received >= limit.get())
            {
                info!("Message limit reached");
                break;
            }

            let started = Instant::now();
            match self.source.poll(self.poll_timeout).await {
                None => continue,
                Some(Ok(message)) => {
                    report.received += 1;
                    self.metrics.record_success(started.elapsed());
                    info!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        key = ?message.key_lossy(),
                        "Message: {}",
                        message.payload_lossy()
                    );
                }
                Some(Err(e)) => {
                    report.failed += 1;
                    self.metrics.record_failure(started.elapsed());
                    warn!("{}", e);
                }
            }

            if !self.pacer.pause(&mut shutdown).await {
                info!("Shutdown requested, stopping consumer");
                break;
            }
        }

        self.source.close().await;
        // `close` consumed the source field, so update `state` directly.
        debug!("Consumer state {:?} -> {:?}", self.state, ConsumerState::Terminated);
        self.state = ConsumerState::Terminated;

        info!(
            received = report.received,
            failed = report.failed,
            "Consumer finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;
    use crate::metrics::CONSUMER_METRICS;
    use crate::pipeline::{shutdown, InboundMessage, MessageRate};
    use std::collections::VecDeque;
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant as TokioInstant;

    enum Event {
        Message(&'static str),
        Error,
        Idle,
    }

    /// Replays scripted events, then idles until the test ends.
    #[derive(Clone, Default)]
    struct ScriptedSource {
        events: Arc<Mutex<VecDeque<Event>>>,
        polls: Arc<AtomicU64>,
        delivered_at: Arc<Mutex<Vec<TokioInstant>>>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        fn with(events: Vec<Event>) -> Self {
            Self {
                events: Arc::new(Mutex::new(events.into())),
                ..Default::default()
            }
        }
    }

    impl MessageSource for ScriptedSource {
        async fn poll(
            &mut self,
            timeout: Duration,
        ) -> Option<Result<InboundMessage, BrokerError>> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let event = self.events.lock().unwrap().pop_front();
            match event {
                Some(Event::Message(payload)) => {
                    self.delivered_at.lock().unwrap().push(TokioInstant::now());
                    Some(Ok(InboundMessage {
                        topic: "my-kafka-topic".to_string(),
                        partition: 0,
                        offset: 7,
                        key: None,
                        payload: Some(payload.as_bytes().to_vec()),
                    }))
                }
                Some(Event::Error) => {
                    Some(Err(BrokerError::Receive("broker down".to_string())))
                }
                Some(Event::Idle) | None => {
                    tokio::time::sleep(timeout).await;
                    None
                }
            }
        }

        async fn close(self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn pacer(per_second: u32) -> Pacer {
        Pacer::new(MessageRate::new(NonZeroU32::new(per_second).unwrap()))
    }

    #[test]
    fn construction_moves_from_init_to_subscribed() {
        let metrics = RoleMetrics::new(&CONSUMER_METRICS).unwrap();
        let consumer = ConsumerLoop::new(ScriptedSource::default(), pacer(1), metrics, None);

        assert_eq!(consumer.state, ConsumerState::Subscribed);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_messages_and_errors_until_limit() {
        let source = ScriptedSource::with(vec![
            Event::Message("a"),
            Event::Idle,
            Event::Error,
            Event::Message("b"),
            Event::Message("c"),
            Event::Message("d"),
        ]);
        let metrics = RoleMetrics::new(&CONSUMER_METRICS).unwrap();
        let (_trigger, shutdown) = shutdown::channel();

        let report = ConsumerLoop::new(
            source.clone(),
            pacer(100),
            metrics.clone(),
            NonZeroU64::new(3),
        )
        .run(shutdown)
        .await;

        assert_eq!(report, ConsumerReport { received: 3, failed: 1 });
        assert_eq!(source.polls.load(Ordering::SeqCst), 5);
        assert!(source.closed.load(Ordering::SeqCst));

        let rendered = metrics.render();
        assert!(rendered.contains("messages_consumed_total 3"), "{rendered}");
        assert!(rendered.contains("message_consumption_errors_total 1"), "{rendered}");
    }

    #[tokio::test(start_paused = true)]
    async fn messages_are_spaced_by_interval() {
        let source = ScriptedSource::with(vec![
            Event::Message("a"),
            Event::Message("b"),
            Event::Message("c"),
        ]);
        let metrics = RoleMetrics::new(&CONSUMER_METRICS).unwrap();
        let (_trigger, shutdown) = shutdown::channel();

        ConsumerLoop::new(source.clone(), pacer(2), metrics, NonZeroU64::new(3))
            .run(shutdown)
            .await;

        let delivered_at = source.delivered_at.lock().unwrap();
        assert_eq!(delivered_at.len(), 3);
        for pair in delivered_at.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_consumer_stops_within_one_poll_timeout() {
        let source = ScriptedSource::default();
        let metrics = RoleMetrics::new(&CONSUMER_METRICS).unwrap();
        let (trigger, shutdown) = shutdown::channel();

        let handle =
            tokio::spawn(ConsumerLoop::new(source.clone(), pacer(1), metrics, None).run(shutdown));

        tokio::time::sleep(Duration::from_millis(1050)).await;
        let triggered_at = TokioInstant::now();
        trigger.trigger();
        let report = handle.await.unwrap();

        assert!(triggered_at.elapsed() <= POLL_TIMEOUT);
        assert_eq!(report, ConsumerReport::default());
        assert!(source.closed.load(Ordering::SeqCst));
    }
}
