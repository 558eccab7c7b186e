// File: httpspec.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::ProbeError;

/// One parsed request sample: request line, headers in file order, body.
///
/// Header order is preserved exactly as parsed because some WAF signatures
/// match on it; a duplicate header name overwrites the earlier value in
/// place without moving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: String,
    pub path: String,
    pub version: String,
    headers: Vec<(String, String)>,
    pub body: String,
}

impl RequestSpec {
    /// Parses the raw text of a sample file.
    ///
    /// The first line is the request line (`METHOD PATH [VERSION]`, the
    /// version defaults to HTTP/1.1). Header lines follow until the first
    /// blank line; lines without a colon are skipped. Everything after the
    /// blank line is the body, with exactly one trailing newline stripped.
    pub fn parse(content: &str) -> Result<RequestSpec, ProbeError> {
        let (first, mut cursor) = match content.split_once('\n') {
            Some((line, rest)) => (line, rest),
            None => (content, ""),
        };

        let request_line = first.trim_end_matches('\r').trim();
        let tokens: Vec<&str> = request_line.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(ProbeError::MalformedSpec(request_line.to_string()));
        }

        let method = tokens[0].to_string();
        let path = tokens[1].to_string();
        let version = tokens.get(2).unwrap_or(&"HTTP/1.1").to_string();

        let mut headers: Vec<(String, String)> = Vec::new();
        let body_raw = loop {
            if cursor.is_empty() {
                break "";
            }
            let (line, rest) = match cursor.split_once('\n') {
                Some((line, rest)) => (line, rest),
                None => (cursor, ""),
            };
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                break rest;
            }
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim().to_string();
                let value = value.trim().to_string();
                match headers.iter_mut().find(|(existing, _)| *existing == name) {
                    Some(slot) => slot.1 = value,
                    None => headers.push((name, value)),
                }
            }
            cursor = rest;
        };

        let body = body_raw
            .strip_suffix("\r\n")
            .or_else(|| body_raw.strip_suffix('\n'))
            .unwrap_or(body_raw)
            .to_string();

        Ok(RequestSpec {
            method,
            path,
            version,
            headers,
            body,
        })
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_headers_and_body() {
        let spec = RequestSpec::parse(
            "POST /login HTTP/1.1\nHost: example.com\nContent-Type: text/plain\n\nuser=admin\n",
        )
        .unwrap();
        assert_eq!(spec.method, "POST");
        assert_eq!(spec.path, "/login");
        assert_eq!(spec.version, "HTTP/1.1");
        assert_eq!(spec.header("host"), Some("example.com"));
        assert_eq!(spec.body, "user=admin");
    }

    #[test]
    fn version_defaults_when_missing() {
        let spec = RequestSpec::parse("GET /\nHost: x\n\n").unwrap();
        assert_eq!(spec.version, "HTTP/1.1");
    }

    #[test]
    fn custom_version_is_preserved() {
        let spec = RequestSpec::parse("GET / HTTP/1.0\nHost: x\n\n").unwrap();
        assert_eq!(spec.version, "HTTP/1.0");
    }

    #[test]
    fn request_line_with_one_token_is_malformed() {
        assert!(matches!(
            RequestSpec::parse("GET\nHost: x\n\n"),
            Err(ProbeError::MalformedSpec(_))
        ));
    }

    #[test]
    fn empty_input_is_malformed() {
        assert!(RequestSpec::parse("").is_err());
    }

    #[test]
    fn header_order_is_preserved() {
        let spec = RequestSpec::parse(
            "GET / HTTP/1.1\nB-Header: 2\nA-Header: 1\nC-Header: 3\n\n",
        )
        .unwrap();
        let names: Vec<&str> = spec.headers().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["B-Header", "A-Header", "C-Header"]);
    }

    #[test]
    fn duplicate_header_wins_late_keeps_position() {
        let spec =
            RequestSpec::parse("GET / HTTP/1.1\nX-One: a\nX-Two: b\nX-One: c\n\n").unwrap();
        assert_eq!(
            spec.headers(),
            &[
                ("X-One".to_string(), "c".to_string()),
                ("X-Two".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn lines_without_colon_are_ignored() {
        let spec = RequestSpec::parse("GET / HTTP/1.1\ngarbage line\nHost: x\n\n").unwrap();
        assert_eq!(spec.headers().len(), 1);
    }

    #[test]
    fn crlf_input_parses_cleanly() {
        let spec =
            RequestSpec::parse("GET /a HTTP/1.1\r\nHost: x\r\n\r\npayload\r\n").unwrap();
        assert_eq!(spec.header("Host"), Some("x"));
        assert_eq!(spec.body, "payload");
    }

    #[test]
    fn only_one_trailing_newline_is_stripped() {
        let spec = RequestSpec::parse("GET / HTTP/1.1\nHost: x\n\nline\n\n").unwrap();
        assert_eq!(spec.body, "line\n");
    }

    #[test]
    fn missing_body_is_empty() {
        let spec = RequestSpec::parse("GET / HTTP/1.1\nHost: x\n").unwrap();
        assert_eq!(spec.body, "");
    }
}
