//! Ingest — reads lines from the input and feeds the work queue.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::metrics::PipelineMetrics;

/// Read until end-of-stream or cancellation, enqueuing each line.
///
/// Input is pulled one buffer refill at a time, so memory per line is capped
/// at `max_line_bytes` however long the line runs, and cancellation is
/// checked between refills.
///
/// Consumes `work_tx`; returning drops it, which closes the work queue.
/// Returns the number of lines enqueued.
pub async fn run_ingestor<R>(
    mut input: R,
    work_tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    max_line_bytes: usize,
    metrics: Arc<PipelineMetrics>,
) -> u64
where
    R: AsyncBufRead + Unpin,
{
    let mut pending = LineBuffer::new(max_line_bytes);
    let mut enqueued: u64 = 0;

    loop {
        let available = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Ingestor observed cancellation while reading");
                break;
            }
            read = input.fill_buf() => match read {
                Ok(available) => available,
                Err(e) => {
                    warn!(error = %e, "Failed to read input, treating as end of stream");
                    break;
                }
            },
        };

        let line = if available.is_empty() {
            if pending.is_empty() {
                debug!("Input EOF reached");
                break;
            }
            // Last line without a terminator.
            pending.finish(false)
        } else {
            match available.iter().position(|b| *b == b'\n') {
                Some(end) => {
                    pending.push(&available[..end]);
                    input.consume(end + 1);
                    pending.finish(true)
                }
                None => {
                    let used = available.len();
                    pending.push(available);
                    input.consume(used);
                    // A reader that is always ready would otherwise keep this
                    // task on the thread for the whole line.
                    tokio::task::yield_now().await;
                    continue;
                }
            }
        };

        metrics.record_line_read();
        let line = match line {
            Ok(line) => line,
            Err(len) => {
                metrics.record_oversized();
                warn!(len, max = max_line_bytes, "Dropping oversized input line");
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Ingestor observed cancellation while enqueuing");
                break;
            }
            sent = work_tx.send(line) => {
                if sent.is_err() {
                    debug!("Work queue has no consumers left");
                    break;
                }
                enqueued += 1;
            }
        }
    }

    debug!(lines = enqueued, "Ingestor closing work queue");
    enqueued
}

/// One input line assembled across buffer refills.
///
/// Holds at most `max + 1` bytes (room for a `\r` before the `\n`). Past that
/// the content is discarded and only the length is tracked until the line
/// ends.
struct LineBuffer {
    buf: Vec<u8>,
    max: usize,
    seen: usize,
}

impl LineBuffer {
    fn new(max: usize) -> Self {
        Self { buf: Vec::new(), max, seen: 0 }
    }

    fn is_empty(&self) -> bool {
        self.seen == 0
    }

    fn push(&mut self, piece: &[u8]) {
        self.seen += piece.len();
        if self.seen <= self.max + 1 {
            self.buf.extend_from_slice(piece);
        } else {
            self.buf.clear();
        }
    }

    /// Take the line, without its `\r\n` when `terminated`, or its length
    /// when it ran past the limit.
    fn finish(&mut self, terminated: bool) -> Result<Bytes, usize> {
        let seen = std::mem::take(&mut self.seen);
        if seen > self.max + 1 {
            self.buf.clear();
            return Err(seen);
        }
        if terminated && self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        if self.buf.len() > self.max {
            let len = self.buf.len();
            self.buf.clear();
            return Err(len);
        }
        let line = Bytes::copy_from_slice(&self.buf);
        self.buf.clear();
        Ok(line)
    }
}
