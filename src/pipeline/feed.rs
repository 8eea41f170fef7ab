use std::future::Future;
use std::io::{self, BufRead};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use super::OutboundMessage;

/// Supplies the producer with messages. `Ok(None)` ends the run.
pub trait MessageFeed: Send {
    fn next_message(
        &mut self,
    ) -> impl Future<Output = io::Result<Option<OutboundMessage>>> + Send;
}

/// Synthesizes `Message <unix nanos>` payloads without a key.
#[derive(Debug, Default)]
pub struct TimestampedFeed;

impl MessageFeed for TimestampedFeed {
    async fn next_message(&mut self) -> io::Result<Option<OutboundMessage>> {
        let now = chrono::Utc::now();
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));
        Ok(Some(OutboundMessage::new(format!("Message {nanos}"))))
    }
}

/// One message per input line, payload taken as raw bytes. Trailing `\r\n`
/// / `\n` is stripped.
pub struct LineFeed<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin + Send> LineFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> MessageFeed for LineFeed<R> {
    async fn next_message(&mut self) -> io::Result<Option<OutboundMessage>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }

        Ok(Some(OutboundMessage::new(trim_line_ending(&self.buf))))
    }
}

/// Lines read on a detached thread. Used for stdin, whose blocking reads
/// cannot be cancelled and would otherwise hold up runtime shutdown.
pub struct ThreadedLineFeed {
    rx: mpsc::Receiver<io::Result<Vec<u8>>>,
}

impl ThreadedLineFeed {
    pub fn spawn<R: BufRead + Send + 'static>(mut reader: R) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(64);
        std::thread::Builder::new()
            .name("line-feed".to_string())
            .spawn(move || loop {
                let mut buf = Vec::new();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let len = trim_line_ending(&buf).len();
                        buf.truncate(len);
                        if tx.blocking_send(Ok(buf)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.blocking_send(Err(e));
                        break;
                    }
                }
            })?;
        Ok(Self { rx })
    }
}

impl MessageFeed for ThreadedLineFeed {
    async fn next_message(&mut self) -> io::Result<Option<OutboundMessage>> {
        match self.rx.recv().await {
            Some(line) => line.map(|payload| Some(OutboundMessage::new(payload))),
            None => Ok(None),
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    match line.strip_suffix(b"\n") {
        Some(rest) => rest.strip_suffix(b"\r").unwrap_or(rest),
        None => line,
    }
}
