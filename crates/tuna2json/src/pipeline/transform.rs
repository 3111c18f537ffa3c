use bytes::Bytes;

use crate::conf::PipelineConfig;
use crate::filter::DomainFilter;
use crate::parser::{AccessLogGrammar, GrammarError, OutputRecord, RecordError};

/// parse → filter → transform → encode for a single raw line.
///
/// Stateless per call and shared by every worker.
pub struct LineTransformer {
    grammar: AccessLogGrammar,
    filter: DomainFilter,
}

impl LineTransformer {
    pub fn new(grammar: AccessLogGrammar, filter: DomainFilter) -> Self {
        Self { grammar, filter }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, GrammarError> {
        Ok(Self::new(AccessLogGrammar::new()?, DomainFilter::from_config(config)))
    }

    pub fn transform(&self, raw: &[u8]) -> Result<Bytes, RecordError> {
        // Invalid UTF-8 becomes U+FFFD rather than failing the line.
        let line = String::from_utf8_lossy(raw);

        let fields = self.grammar.extract(&line).ok_or(RecordError::NoMatch)?;
        self.filter.check(&fields)?;
        OutputRecord::from_fields(&fields)?.encode()
    }
}
