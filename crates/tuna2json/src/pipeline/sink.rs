//! Sink — the single writer of encoded records.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::metrics::PipelineMetrics;
use super::state::{ShutdownState, ShutdownTracker};

/// Drain the output queue into `output`.
///
/// A write failure is fatal: the pipeline is marked cancelled, the token is
/// cancelled and the error returned. The token is also cancelled if this
/// task unwinds, so no stage is left blocked on a dead sink.
pub async fn run_sink<W>(
    mut output_rx: mpsc::Receiver<Bytes>,
    mut output: W,
    cancel: CancellationToken,
    state: Arc<ShutdownTracker>,
    metrics: Arc<PipelineMetrics>,
) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    let guard = cancel.clone().drop_guard();

    loop {
        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Sink observed cancellation");
                break;
            }
            record = output_rx.recv() => match record {
                Some(record) => record,
                None => break,
            },
        };

        if let Err(e) = write_record(&mut output, &record).await {
            error!(error = %e, "Failed to write record, cancelling pipeline");
            state.advance(ShutdownState::Cancelled);
            drop(guard);
            return Err(e);
        }
        metrics.record_written();
    }

    guard.disarm();
    debug!("Sink finished");
    Ok(output)
}

/// One complete record per write, flushed so a broken destination surfaces
/// on the record that hit it.
async fn write_record<W>(output: &mut W, record: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(record).await?;
    output.flush().await
}
