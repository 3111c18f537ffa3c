//! Pipeline — ingestor, transform pool and sink wired through two bounded
//! queues and one cancellation token.
//!
//! Shutdown is cooperative. The ingestor dropping its sender closes the work
//! queue; the last worker dropping its sender closes the output queue; the
//! sink draining the output queue ends the run. A sink write failure cancels
//! the token instead, and every stage stops at its next await point. Records
//! from different workers reach the output in no particular order.

pub mod ingest;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod sink;
pub mod state;
pub mod transform;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::conf::PipelineConfig;
use crate::parser::GrammarError;
use metrics::{MetricsSnapshot, PipelineMetrics};
use state::{ShutdownState, ShutdownTracker};
use transform::LineTransformer;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("Pipeline has already run")]
    AlreadyStarted,

    #[error("Output write failed: {0}")]
    Output(#[source] std::io::Error),

    #[error("Pipeline stage {stage} failed: {source}")]
    Task {
        stage: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

pub struct Pipeline {
    config: PipelineConfig,
    transformer: Arc<LineTransformer>,
    started: AtomicBool,
    state: Arc<ShutdownTracker>,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;
        let transformer = Arc::new(LineTransformer::from_config(&config)?);

        Ok(Self {
            config,
            transformer,
            started: AtomicBool::new(false),
            state: Arc::new(ShutdownTracker::new()),
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    pub fn state(&self) -> ShutdownState {
        self.state.current()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run every stage to completion and hand the output back.
    ///
    /// All stages are joined before returning, on both the normal and the
    /// cancelled path. A pipeline runs once; its state and counters describe
    /// that run.
    pub async fn run<R, W>(&self, input: R, output: W) -> Result<W, PipelineError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::AlreadyStarted);
        }
        let cancel = CancellationToken::new();

        info!(
            workers = self.config.workers,
            work_queue = self.config.work_queue_capacity,
            output_queue = self.config.output_queue_capacity,
            "Starting pipeline"
        );

        let (work_tx, work_rx) = queue::bounded::<Bytes>(self.config.work_queue_capacity);
        let (output_tx, output_rx) = mpsc::channel::<Bytes>(self.config.output_queue_capacity);

        let sink = tokio::spawn(sink::run_sink(
            output_rx,
            output,
            cancel.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.metrics),
        ));

        // `output_tx` moves into the pool; only worker clones remain.
        let workers = pool::spawn_workers(
            self.config.workers,
            work_rx,
            output_tx,
            Arc::clone(&self.transformer),
            cancel.clone(),
            Arc::clone(&self.metrics),
        );

        let ingestor = tokio::spawn(ingest::run_ingestor(
            input,
            work_tx,
            cancel.clone(),
            self.config.max_line_bytes,
            Arc::clone(&self.metrics),
        ));

        let mut failure: Option<PipelineError> = None;

        match ingestor.await {
            Ok(lines) => info!(lines, "Input finished"),
            Err(e) => {
                error!(error = %e, "Ingestor task failed");
                failure.get_or_insert(PipelineError::Task { stage: "ingestor", source: e });
            }
        }
        self.state.advance(ShutdownState::Draining);

        for (worker_id, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker = worker_id, error = %e, "Worker task failed");
                failure.get_or_insert(PipelineError::Task { stage: "worker", source: e });
            }
        }
        self.state.advance(ShutdownState::Flushing);

        let result = match sink.await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(PipelineError::Output(e)),
            Err(e) => {
                error!(error = %e, "Sink task failed");
                Err(PipelineError::Task { stage: "sink", source: e })
            }
        };

        if cancel.is_cancelled() {
            self.state.advance(ShutdownState::Cancelled);
        } else {
            self.state.advance(ShutdownState::Terminated);
        }

        let summary = self.metrics.snapshot();
        info!(
            state = self.state.current().as_str(),
            lines_read = summary.lines_read,
            records_written = summary.records_written,
            dropped = summary.dropped(),
            "Pipeline finished"
        );

        // A fatal output error outranks any stage failure it caused.
        match (result, failure) {
            (Err(e), _) => Err(e),
            (Ok(_), Some(e)) => Err(e),
            (Ok(output), None) => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn access_line(remote: &str, method: &str, path: &str, size: &str) -> String {
        format!(
            r#"{remote} - - [10/Oct/2023:13:55:36 -0700] "{method} {path} HTTP/1.1" 200 {size} "application/octet-stream" "-" "MacPorts/2.9.3" - https"#
        )
    }

    fn config(workers: usize, capacity: usize) -> PipelineConfig {
        PipelineConfig {
            workers,
            work_queue_capacity: capacity,
            output_queue_capacity: capacity,
            ..Default::default()
        }
    }

    fn count_lines(output: &[u8]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for line in output.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
            *counts.entry(String::from_utf8(line.to_vec()).unwrap()).or_insert(0) += 1;
        }
        counts
    }

    /// Accepts writes until `remaining` hits zero, then fails like a closed pipe.
    struct FailAfter {
        remaining: usize,
    }

    impl AsyncWrite for FailAfter {
        fn poll_write(mut self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            if self.remaining == 0 {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed pipe")));
            }
            self.remaining -= 1;
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_output_multiset_matches_filter() {
        let mut input = String::new();
        let mut expected = 0;
        for i in 0..500 {
            let remote = format!("10.0.{}.{}", i / 256, i % 256);
            let line = match i % 5 {
                0 => access_line(&remote, "GET", &format!("/macports/f{i}"), "100"),
                1 => access_line(&remote, "POST", "/macports/upload", "100"),
                2 => access_line(&remote, "HEAD", "/other/f", "100"),
                3 => format!("malformed {i}"),
                _ => access_line(&remote, "OPTIONS", "/macports/", "-"),
            };
            if i % 5 == 0 {
                expected += 1;
            }
            input.push_str(&line);
            input.push('\n');
        }

        let pipeline = Pipeline::new(config(8, 4)).unwrap();
        let output = pipeline.run(io::Cursor::new(input.into_bytes()), Vec::new()).await.unwrap();

        let counts = count_lines(&output);
        assert_eq!(counts.len(), expected);
        assert!(counts.values().all(|n| *n == 1));
        for record in counts.keys() {
            let v: serde_json::Value = serde_json::from_str(record).unwrap();
            assert_eq!(v["method"], "GET");
            assert_eq!(v["time"], "2023-10-10T20:55:36Z");
            assert!(v["path"].as_str().unwrap().starts_with("/macports/f"));
        }

        let s = pipeline.metrics();
        assert_eq!(s.lines_read, 500);
        assert_eq!(s.records_written as usize, expected);
        assert_eq!(s.filtered, 200);
        assert_eq!(s.grammar_mismatch, 100);
        assert_eq!(s.bad_size, 100);
        assert_eq!(pipeline.state(), ShutdownState::Terminated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_loss_under_backpressure() {
        let line = access_line("192.0.2.1", "GET", "/macports/x", "1");
        let input = format!("{line}\n").repeat(2_000);

        // Single-slot queues force every stage to wait on its neighbour.
        let pipeline = Pipeline::new(config(16, 1)).unwrap();
        let output = pipeline.run(io::Cursor::new(input.into_bytes()), Vec::new()).await.unwrap();

        let counts = count_lines(&output);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.values().sum::<usize>(), 2_000);
    }

    #[tokio::test]
    async fn test_malformed_lines_do_not_stall() {
        let good = access_line("192.0.2.1", "GET", "/macports/ok", "7");
        let input = format!(
            "{bad1}\n{good}\n{bad2}\n\n{good}\n",
            bad1 = r#"1.1.1.1 - - [10/Oct/2023:13:55:36 -0700] "GET /macports/x HTTP/1.1" 200 1 "-" "-" - https"#,
            bad2 = r#"1.1.1.1 - - [10/Oct/2023:13:55:36 -0700] "GET /macports/x HTTP/1.1" 200 1 "a" "b" "c" "d" - https"#,
        );

        let pipeline = Pipeline::new(config(2, 2)).unwrap();
        let output = tokio::time::timeout(
            Duration::from_secs(5),
            pipeline.run(io::Cursor::new(input.into_bytes()), Vec::new()),
        )
        .await
        .expect("pipeline should not stall")
        .unwrap();

        assert_eq!(count_lines(&output).values().sum::<usize>(), 2);
        assert_eq!(pipeline.metrics().grammar_mismatch, 3);
    }

    #[tokio::test]
    async fn test_empty_input_terminates_cleanly() {
        let pipeline = Pipeline::new(config(4, 4)).unwrap();
        let output = pipeline.run(io::Cursor::new(Vec::new()), Vec::new()).await.unwrap();
        assert!(output.is_empty());
        assert_eq!(pipeline.state(), ShutdownState::Terminated);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_write_failure_stops_pipeline_with_open_input() {
        // Input never reaches EOF: only cancellation can end the run.
        let (mut producer, reader) = tokio::io::duplex(1 << 16);
        let line = access_line("192.0.2.1", "GET", "/macports/x", "1");
        let feeder = tokio::spawn(async move {
            loop {
                if producer.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        let pipeline = Pipeline::new(config(4, 2)).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            pipeline.run(tokio::io::BufReader::new(reader), FailAfter { remaining: 3 }),
        )
        .await
        .expect("pipeline should terminate after a fatal write error");

        assert!(matches!(result, Err(PipelineError::Output(ref e)) if e.kind() == io::ErrorKind::BrokenPipe));
        assert_eq!(pipeline.state(), ShutdownState::Cancelled);
        assert_eq!(pipeline.metrics().records_written, 3);

        // The reader half is gone, so the feeder unblocks with an error.
        tokio::time::timeout(Duration::from_secs(5), feeder).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_second_run_rejected_after_cancel() {
        let input = format!("{}\n", access_line("192.0.2.1", "GET", "/macports/x", "1"));

        let pipeline = Pipeline::new(config(2, 2)).unwrap();
        let first = pipeline
            .run(io::Cursor::new(input.clone().into_bytes()), FailAfter { remaining: 0 })
            .await;
        assert!(matches!(first, Err(PipelineError::Output(_))));
        assert_eq!(pipeline.state(), ShutdownState::Cancelled);

        let again = pipeline.run(io::Cursor::new(input.into_bytes()), Vec::new()).await;
        assert!(matches!(again, Err(PipelineError::AlreadyStarted)));
        assert_eq!(pipeline.metrics().lines_read, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Pipeline::new(config(0, 4));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
