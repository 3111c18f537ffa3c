use std::sync::atomic::{AtomicU64, Ordering};

use crate::parser::RecordError;

/// Forces the wrapped group onto its own cache line so stages updating
/// different groups do not contend.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Ingestor counters
#[derive(Debug, Default)]
pub struct IntakeMetrics {
    pub lines_read: AtomicU64,
    pub lines_oversized: AtomicU64,
}

/// Per-line drop reasons (updated by every worker)
#[derive(Debug, Default)]
pub struct DropMetrics {
    pub grammar_mismatch: AtomicU64,
    pub filtered: AtomicU64,
    pub bad_timestamp: AtomicU64,
    pub bad_size: AtomicU64,
    pub encode_failed: AtomicU64,
}

/// Output side counters
#[derive(Debug, Default)]
pub struct OutputMetrics {
    pub records_produced: AtomicU64,
    pub records_written: AtomicU64,
}

/// Pipeline counters. All operations use `Ordering::Relaxed`; a snapshot
/// may tear across groups while the pipeline is running.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub intake: CacheAligned<IntakeMetrics>,
    pub drops: CacheAligned<DropMetrics>,
    pub output: CacheAligned<OutputMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub lines_read: u64,
    pub lines_oversized: u64,
    pub grammar_mismatch: u64,
    pub filtered: u64,
    pub bad_timestamp: u64,
    pub bad_size: u64,
    pub encode_failed: u64,
    pub records_produced: u64,
    pub records_written: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_line_read(&self) {
        self.intake.0.lines_read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_oversized(&self) {
        self.intake.0.lines_oversized.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_produced(&self) {
        self.output.0.records_produced.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_written(&self) {
        self.output.0.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self, err: &RecordError) {
        let d = &self.drops.0;
        let counter = match err {
            RecordError::NoMatch => &d.grammar_mismatch,
            RecordError::PathRejected(_) | RecordError::MethodRejected(_) => &d.filtered,
            RecordError::MalformedTimestamp(_) | RecordError::InvalidTimestamp(_) => &d.bad_timestamp,
            RecordError::InvalidSize(_) => &d.bad_size,
            RecordError::Encode(_) => &d.encode_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let i = &self.intake.0;
        let d = &self.drops.0;
        let o = &self.output.0;
        MetricsSnapshot {
            lines_read: i.lines_read.load(Ordering::Relaxed),
            lines_oversized: i.lines_oversized.load(Ordering::Relaxed),
            grammar_mismatch: d.grammar_mismatch.load(Ordering::Relaxed),
            filtered: d.filtered.load(Ordering::Relaxed),
            bad_timestamp: d.bad_timestamp.load(Ordering::Relaxed),
            bad_size: d.bad_size.load(Ordering::Relaxed),
            encode_failed: d.encode_failed.load(Ordering::Relaxed),
            records_produced: o.records_produced.load(Ordering::Relaxed),
            records_written: o.records_written.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Lines that reached a worker and were dropped there.
    pub fn dropped(&self) -> u64 {
        self.grammar_mismatch + self.filtered + self.bad_timestamp + self.bad_size + self.encode_failed
    }
}
