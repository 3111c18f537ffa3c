//! Run — stream stdin through the pipeline to stdout.

use tokio::io::{self, BufReader};
use tracing::error;

use crate::pipeline::{Pipeline, PipelineError};

/// Exit status for a fatal output failure.
pub const EXIT_OUTPUT_FAILED: i32 = 1;

pub async fn run(pipeline: Pipeline) -> Result<(), Box<dyn std::error::Error>> {
    match pipeline.run(BufReader::new(io::stdin()), io::stdout()).await {
        Ok(_) => Ok(()),
        Err(PipelineError::Output(e)) => {
            error!("Output destination failed: {}", e);
            // A stdin read parked on the blocking pool would hold up runtime
            // shutdown until more input arrives; leave without waiting for it.
            std::process::exit(EXIT_OUTPUT_FAILED);
        }
        Err(e) => Err(e.into()),
    }
}
