//! Record — field transformation and JSON encoding of accepted lines.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};

use super::model::{OutputRecord, ParsedFields, RecordError};

/// Apache common-log timestamp, e.g. `10/Oct/2023:13:55:36 -0700`.
pub const ACCESS_LOG_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Byte layout every timestamp must have before chrono sees it: `0` is a
/// digit, `A` a letter, `+` an offset sign. chrono alone accepts unpadded
/// days and `-07:00` offsets.
const ACCESS_LOG_TIME_SHAPE: &[u8; 26] = b"00/AAA/0000:00:00:00 +0000";

fn has_access_log_shape(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == ACCESS_LOG_TIME_SHAPE.len()
        && bytes.iter().zip(ACCESS_LOG_TIME_SHAPE).all(|(b, shape)| match shape {
            b'0' => b.is_ascii_digit(),
            b'A' => b.is_ascii_alphabetic(),
            b'+' => *b == b'+' || *b == b'-',
            _ => b == shape,
        })
}

/// Parse an access-log timestamp and render it as RFC3339 in UTC.
pub fn convert_timestamp(text: &str) -> Result<String, RecordError> {
    if !has_access_log_shape(text) {
        return Err(RecordError::MalformedTimestamp(text.to_string()));
    }
    let parsed = DateTime::parse_from_str(text, ACCESS_LOG_TIME_FORMAT)?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true))
}

pub fn parse_size(text: &str) -> Result<u64, RecordError> {
    Ok(text.parse::<u64>()?)
}

impl<'a> OutputRecord<'a> {
    /// Build the output record from filtered captures.
    pub fn from_fields(fields: &ParsedFields<'a>) -> Result<Self, RecordError> {
        Ok(Self {
            time: convert_timestamp(fields.time)?,
            method: fields.method,
            path: fields.path,
            code: fields.code,
            size: parse_size(fields.size)?,
            agent: fields.agent,
            scheme: fields.scheme,
            remote: fields.remote,
        })
    }

    /// Compact JSON with a trailing newline, ready for a single write.
    pub fn encode(&self) -> Result<Bytes, RecordError> {
        let mut encoded = serde_json::to_vec(self)?;
        encoded.push(b'\n');
        Ok(Bytes::from(encoded))
    }
}
