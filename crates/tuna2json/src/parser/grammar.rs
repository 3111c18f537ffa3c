//! Grammar — access-log line extraction with named captures.
//!
//! Line shape:
//! `REMOTE - USER [TIME] "METHOD PATH [IGNORED]" CODE SIZE "TYPE" "REFERER" "AGENT" - SCHEME`

use grep_matcher::{Captures, Matcher};
use grep_regex::{RegexCaptures, RegexMatcher, RegexMatcherBuilder};
use thiserror::Error;

use super::model::ParsedFields;

/// The access-log pattern. The whole `METHOD PATH TAIL` group after the
/// method is optional, and the tail after the path is consumed but dropped.
pub const ACCESS_LOG_PATTERN: &str = r#"^(?P<remote>[^ ]*) - (?P<user>[^ ]*) \[(?P<time>[^\]]*)\] "(?P<method>\S+)(?: +(?P<path>[^"]*?)(?: +\S*)?)?" (?P<code>[^ ]*) (?P<size>[^ ]*) "(?P<type>[^"]*)" "(?P<referer>[^"]*)" "(?P<agent>[^"]*)" - (?P<scheme>[^ ]*)$"#;

#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("Invalid grammar pattern: {0}")]
    InvalidRegex(String),

    #[error("Grammar pattern lacks capture group {0:?}")]
    MissingCapture(&'static str),
}

/// Capture group indices resolved once at construction.
#[derive(Debug, Clone, Copy)]
struct Slots {
    remote: usize,
    user: usize,
    time: usize,
    method: usize,
    path: usize,
    code: usize,
    size: usize,
    content_type: usize,
    referer: usize,
    agent: usize,
    scheme: usize,
}

pub struct AccessLogGrammar {
    matcher: RegexMatcher,
    slots: Slots,
}

impl AccessLogGrammar {
    pub fn new() -> Result<Self, GrammarError> {
        let matcher = RegexMatcherBuilder::new()
            .multi_line(false)
            .build(ACCESS_LOG_PATTERN)
            .map_err(|e| GrammarError::InvalidRegex(e.to_string()))?;

        let index = |name: &'static str| {
            matcher
                .capture_index(name)
                .ok_or(GrammarError::MissingCapture(name))
        };

        let slots = Slots {
            remote: index("remote")?,
            user: index("user")?,
            time: index("time")?,
            method: index("method")?,
            path: index("path")?,
            code: index("code")?,
            size: index("size")?,
            content_type: index("type")?,
            referer: index("referer")?,
            agent: index("agent")?,
            scheme: index("scheme")?,
        };

        Ok(Self { matcher, slots })
    }

    /// Match a line against the grammar. `None` means the line is malformed.
    pub fn extract<'a>(&self, line: &'a str) -> Option<ParsedFields<'a>> {
        let mut caps = self.matcher.new_captures().ok()?;
        if !self.matcher.captures(line.as_bytes(), &mut caps).unwrap_or(false) {
            return None;
        }

        let s = &self.slots;
        Some(ParsedFields {
            remote: group(line, &caps, s.remote),
            user: group(line, &caps, s.user),
            time: group(line, &caps, s.time),
            method: group(line, &caps, s.method),
            path: group(line, &caps, s.path),
            code: group(line, &caps, s.code),
            size: group(line, &caps, s.size),
            content_type: group(line, &caps, s.content_type),
            referer: group(line, &caps, s.referer),
            agent: group(line, &caps, s.agent),
            scheme: group(line, &caps, s.scheme),
        })
    }
}

/// A group that did not participate in the match reads as empty.
fn group<'a>(line: &'a str, caps: &RegexCaptures, index: usize) -> &'a str {
    caps.get(index)
        .and_then(|m| line.get(m.start()..m.end()))
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"192.0.2.7 - - [10/Oct/2023:13:55:36 -0700] "GET /macports/distfiles/zlib/zlib-1.3.tar.xz HTTP/1.1" 200 1290184 "application/x-xz" "-" "MacPorts/2.8.1 libcurl/8.1.2" - https"#;

    fn grammar() -> AccessLogGrammar {
        AccessLogGrammar::new().expect("Failed to build grammar")
    }

    #[test]
    fn test_extract_full_line() {
        let g = grammar();
        let f = g.extract(LINE).expect("line should match");
        assert_eq!(f.remote, "192.0.2.7");
        assert_eq!(f.user, "-");
        assert_eq!(f.time, "10/Oct/2023:13:55:36 -0700");
        assert_eq!(f.method, "GET");
        assert_eq!(f.path, "/macports/distfiles/zlib/zlib-1.3.tar.xz");
        assert_eq!(f.code, "200");
        assert_eq!(f.size, "1290184");
        assert_eq!(f.content_type, "application/x-xz");
        assert_eq!(f.referer, "-");
        assert_eq!(f.agent, "MacPorts/2.8.1 libcurl/8.1.2");
        assert_eq!(f.scheme, "https");
    }

    #[test]
    fn test_extract_without_protocol_tail() {
        let g = grammar();
        let line = r#"::1 - bob [01/Jan/2024:00:00:00 +0000] "HEAD /macports/" 304 0 "-" "-" "curl" - http"#;
        let f = g.extract(line).unwrap();
        assert_eq!(f.user, "bob");
        assert_eq!(f.method, "HEAD");
        assert_eq!(f.path, "/macports/");
    }

    #[test]
    fn test_extract_method_only_has_empty_path() {
        let g = grammar();
        let line = r#"1.2.3.4 - - [01/Jan/2024:00:00:00 +0000] "GET" 400 0 "-" "-" "-" - http"#;
        let f = g.extract(line).unwrap();
        assert_eq!(f.method, "GET");
        assert_eq!(f.path, "");
    }

    #[test]
    fn test_extract_path_with_spaces_keeps_lazy_prefix() {
        let g = grammar();
        let line = r#"1.2.3.4 - - [01/Jan/2024:00:00:00 +0000] "GET /macports/a b HTTP/1.1" 200 5 "-" "-" "-" - http"#;
        let f = g.extract(line).unwrap();
        assert_eq!(f.path, "/macports/a b");
    }

    #[test]
    fn test_extract_keeps_code_verbatim() {
        let g = grammar();
        let line = r#"1.2.3.4 - - [01/Jan/2024:00:00:00 +0000] "GET /macports/x HTTP/1.1" 0200 5 "-" "-" "-" - http"#;
        assert_eq!(g.extract(line).unwrap().code, "0200");
    }

    #[test]
    fn test_extract_missing_quoted_field() {
        let g = grammar();
        let line = r#"1.2.3.4 - - [01/Jan/2024:00:00:00 +0000] "GET /macports/x HTTP/1.1" 200 5 "-" "-" - http"#;
        assert!(g.extract(line).is_none());
    }

    #[test]
    fn test_extract_extra_quoted_field() {
        let g = grammar();
        let line = r#"1.2.3.4 - - [01/Jan/2024:00:00:00 +0000] "GET /macports/x HTTP/1.1" 200 5 "-" "-" "-" "extra" - http"#;
        assert!(g.extract(line).is_none());
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let g = grammar();
        assert!(g.extract("").is_none());
        assert!(g.extract("Just some random text").is_none());
    }
}
