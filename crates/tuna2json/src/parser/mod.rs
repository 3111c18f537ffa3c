/// Access-log parsing and record conversion
///
/// - `grammar.rs`: fixed access-log grammar with named captures
/// - `record.rs`: timestamp/size conversion and JSON encoding
/// - `model.rs`: parsed fields, output record, per-line errors

pub mod grammar;
pub mod model;
pub mod record;

pub use grammar::{AccessLogGrammar, GrammarError};
pub use model::{OutputRecord, ParsedFields, RecordError};
