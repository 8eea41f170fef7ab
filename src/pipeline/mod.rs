pub mod consumer;
pub mod feed;
pub mod message;
pub mod pacer;
pub mod producer;
pub mod shutdown;

use std::future::Future;
use std::time::Duration;

use crate::error::BrokerError;

pub use consumer::ConsumerLoop;
pub use feed::{LineFeed, MessageFeed, ThreadedLineFeed, TimestampedFeed};
pub use message::{InboundMessage, OutboundMessage};
pub use pacer::{MessageRate, Pacer};
pub use producer::ProducerLoop;
pub use shutdown::Shutdown;

/// Destination for produced messages.
pub trait MessageSink: Send {
    fn send(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Flushes anything still in flight and releases the broker handle.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

/// Origin of consumed messages.
pub trait MessageSource: Send {
    /// Waits at most `timeout` for the next event. `None` means nothing
    /// arrived in time.
    fn poll(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Option<Result<InboundMessage, BrokerError>>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}
