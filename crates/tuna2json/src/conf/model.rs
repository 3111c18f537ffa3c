//! Model — PipelineConfig and its defaults.

use serde::{Deserialize, Serialize};

/// Worker count used when the platform cannot report its parallelism.
pub const FALLBACK_WORKERS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of transform workers pulling from the work queue.
    pub workers: usize,
    pub work_queue_capacity: usize,
    pub output_queue_capacity: usize,
    /// Accepted requests must have a path starting with this prefix.
    pub path_prefix: String,
    /// Read-only methods that pass the domain filter.
    pub allowed_methods: Vec<String>,
    /// Lines longer than this are dropped by the ingestor.
    pub max_line_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            work_queue_capacity: 100,
            output_queue_capacity: 100,
            path_prefix: "/macports/".to_string(),
            allowed_methods: vec!["GET".to_string(), "HEAD".to_string(), "OPTIONS".to_string()],
            max_line_bytes: 1_048_576, // 1MB
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_WORKERS)
}

impl PipelineConfig {
    /// Validate that configuration values are sane
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be > 0".to_string());
        }
        if self.work_queue_capacity == 0 {
            return Err("work_queue_capacity must be > 0".to_string());
        }
        if self.output_queue_capacity == 0 {
            return Err("output_queue_capacity must be > 0".to_string());
        }
        if self.path_prefix.is_empty() {
            return Err("path_prefix must not be empty".to_string());
        }
        if self.allowed_methods.is_empty() {
            return Err("allowed_methods must list at least one method".to_string());
        }
        if self.allowed_methods.iter().any(|m| m.trim().is_empty()) {
            return Err("allowed_methods must not contain empty entries".to_string());
        }
        if self.max_line_bytes == 0 {
            return Err("max_line_bytes must be > 0".to_string());
        }
        Ok(())
    }
}
