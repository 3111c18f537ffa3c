//! Load — config loading from file and environment variables.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::PipelineConfig;

pub const CONFIG_FILE_ENV: &str = "TUNA2JSON_CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "/etc/tuna2json/tuna2json.toml";

impl PipelineConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", config_path);
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: PipelineConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Overlay values from environment-style lookups. Unparseable values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = lookup("TUNA2JSON_WORKERS").and_then(|s| s.parse().ok()) {
            self.workers = n;
        }
        if let Some(n) = lookup("TUNA2JSON_WORK_QUEUE_CAPACITY").and_then(|s| s.parse().ok()) {
            self.work_queue_capacity = n;
        }
        if let Some(n) = lookup("TUNA2JSON_OUTPUT_QUEUE_CAPACITY").and_then(|s| s.parse().ok()) {
            self.output_queue_capacity = n;
        }
        if let Some(prefix) = lookup("TUNA2JSON_PATH_PREFIX") {
            self.path_prefix = prefix;
        }
        if let Some(methods) = lookup("TUNA2JSON_ALLOWED_METHODS") {
            self.allowed_methods = methods
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }
        if let Some(n) = lookup("TUNA2JSON_MAX_LINE_BYTES").and_then(|s| s.parse().ok()) {
            self.max_line_bytes = n;
        }
    }
}
