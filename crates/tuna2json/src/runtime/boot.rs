//! Boot — logging init, config load, pipeline creation.

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::PipelineConfig;
use crate::pipeline::Pipeline;

/// Initialise the tracing / logging subsystem.
///
/// Diagnostics go to stderr; stdout carries nothing but records.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuna2json=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load config and build the pipeline.
pub fn boot() -> Result<Pipeline, Box<dyn std::error::Error>> {
    info!("Starting tuna2json v{}", env!("CARGO_PKG_VERSION"));

    let config = PipelineConfig::load()?;
    info!(
        "Loaded configuration: workers={}, path_prefix={}, allowed_methods={}",
        config.workers,
        config.path_prefix,
        config.allowed_methods.join(",")
    );

    let pipeline = Pipeline::new(config).map_err(|e| {
        error!("Failed to build pipeline: {}", e);
        e
    })?;

    Ok(pipeline)
}
