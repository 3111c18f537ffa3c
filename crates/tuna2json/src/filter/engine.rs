use crate::conf::PipelineConfig;
use crate::parser::{ParsedFields, RecordError};

/// Domain filter: only read-only requests under one resource namespace pass.
pub struct DomainFilter {
    path_prefix: String,
    allowed_methods: Vec<String>,
}

impl DomainFilter {
    pub fn new(path_prefix: impl Into<String>, allowed_methods: Vec<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            allowed_methods,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.path_prefix.clone(), config.allowed_methods.clone())
    }

    /// Methods are compared case-sensitively, as they appear on the wire.
    #[inline]
    pub fn check(&self, fields: &ParsedFields<'_>) -> Result<(), RecordError> {
        if !fields.path.starts_with(self.path_prefix.as_str()) {
            return Err(RecordError::PathRejected(fields.path.to_string()));
        }
        if !self.allowed_methods.iter().any(|m| m == fields.method) {
            return Err(RecordError::MethodRejected(fields.method.to_string()));
        }
        Ok(())
    }
}

impl Default for DomainFilter {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
