//! Pool — parallel transform workers between the two queues.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::metrics::PipelineMetrics;
use super::queue::SharedReceiver;
use super::transform::LineTransformer;
use crate::parser::RecordError;

/// Spawn `count` workers. Each holds a clone of `output_tx`; the output
/// queue closes once the last worker exits.
pub fn spawn_workers(
    count: usize,
    work_rx: SharedReceiver<Bytes>,
    output_tx: mpsc::Sender<Bytes>,
    transformer: Arc<LineTransformer>,
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|worker_id| {
            tokio::spawn(run_worker(
                worker_id,
                work_rx.clone(),
                output_tx.clone(),
                Arc::clone(&transformer),
                cancel.clone(),
                Arc::clone(&metrics),
            ))
        })
        .collect()
}

async fn run_worker(
    worker_id: usize,
    work_rx: SharedReceiver<Bytes>,
    output_tx: mpsc::Sender<Bytes>,
    transformer: Arc<LineTransformer>,
    cancel: CancellationToken,
    metrics: Arc<PipelineMetrics>,
) {
    let mut processed: u64 = 0;

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            line = work_rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };
        processed += 1;

        let record = match transformer.transform(&line) {
            Ok(record) => record,
            Err(e) => {
                metrics.record_drop(&e);
                report_drop(worker_id, &e, &line);
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = output_tx.send(record) => {
                if sent.is_err() {
                    debug!(worker = worker_id, "Output queue closed, worker stopping");
                    break;
                }
                metrics.record_produced();
            }
        }
    }

    debug!(worker = worker_id, lines = processed, "Worker exiting");
}

fn report_drop(worker_id: usize, err: &RecordError, raw: &[u8]) {
    let line = String::from_utf8_lossy(raw);
    if err.is_diagnostic() {
        warn!(worker = worker_id, line = %line, "{}", err);
    } else if err.is_filtered() {
        trace!(worker = worker_id, "{}", err);
    } else {
        debug!(worker = worker_id, line = %line, "{}", err);
    }
}
