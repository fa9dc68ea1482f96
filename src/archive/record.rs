// SPDX-License-Identifier: PMPL-1.0-or-later
//! WARC record decoding.
//!
//! A fetched byte range holds exactly one gzip member. Once inflated it is a
//! WARC header block, a blank line, the archived HTTP response head, another
//! blank line and the payload.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::io::Read;

/// The HTTP response stored inside a WARC response record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedResponse {
    /// WARC header fields, in order
    pub warc_headers: Vec<(String, String)>,
    pub status: u16,
    /// HTTP header fields, in order
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ArchivedResponse {
    /// First HTTP header value with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// First WARC header value with this name (case-insensitive)
    pub fn warc_header(&self, name: &str) -> Option<&str> {
        find_header(&self.warc_headers, name)
    }

    /// Whether the archived payload uses chunked transfer coding
    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    }

    /// Payload with any chunked transfer coding removed
    pub fn payload(&self) -> Vec<u8> {
        if self.is_chunked() {
            dechunk(&self.body)
        } else {
            self.body.clone()
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Inflate a single gzip member
pub fn decompress_member(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::ArchiveFormat(format!("gzip decode failed: {}", e)))?;
    Ok(out)
}

/// Position of the first blank line at or after `from`.
/// Returns (end of the header block, start of what follows).
fn blank_line(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let hay = data.get(from..)?;
    let crlf = hay.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    let lf = hay.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let (pos, sep) = match (crlf, lf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    Some((from + pos, from + pos + sep))
}

fn parse_fields<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<(String, String)> {
    lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Split an inflated WARC record into its archived HTTP response
pub fn parse_record(data: &[u8]) -> Result<ArchivedResponse> {
    if !data.starts_with(b"WARC/") {
        return Err(Error::ArchiveFormat("missing WARC version line".to_string()));
    }

    let (warc_end, http_start) = blank_line(data, 0)
        .ok_or_else(|| Error::ArchiveFormat("unterminated WARC header block".to_string()))?;
    let warc_block = String::from_utf8_lossy(&data[..warc_end]);
    let warc_headers = parse_fields(warc_block.lines().skip(1));

    if let Some(kind) = find_header(&warc_headers, "WARC-Type") {
        if !kind.eq_ignore_ascii_case("response") {
            return Err(Error::ArchiveFormat(format!(
                "expected a response record, found '{}'",
                kind
            )));
        }
    }

    let (http_end, body_start) = blank_line(data, http_start)
        .ok_or_else(|| Error::ArchiveFormat("unterminated HTTP header block".to_string()))?;
    let http_block = String::from_utf8_lossy(&data[http_start..http_end]);
    let mut lines = http_block.lines();

    let status_line = lines.next().unwrap_or_default();
    let status = parse_status_line(status_line).ok_or_else(|| {
        Error::ArchiveFormat(format!("malformed HTTP status line '{}'", status_line.trim()))
    })?;

    Ok(ArchivedResponse {
        warc_headers,
        status,
        headers: parse_fields(lines),
        body: data[body_start..].to_vec(),
    })
}

fn parse_status_line(line: &str) -> Option<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

/// Remove HTTP/1.1 chunked transfer coding. Chunk extensions are ignored and a
/// truncated stream keeps whatever was complete.
pub fn dechunk(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut pos = 0;

    while pos < data.len() {
        let Some(line_len) = data[pos..].windows(2).position(|w| w == b"\r\n") else {
            break;
        };
        let size_line = String::from_utf8_lossy(&data[pos..pos + line_len]);
        let size_str = size_line.split(';').next().unwrap_or_default().trim();
        if size_str.is_empty() {
            pos += line_len + 2;
            continue;
        }
        let Ok(size) = usize::from_str_radix(size_str, 16) else {
            break;
        };
        if size == 0 {
            break;
        }
        let start = pos + line_len + 2;
        let end = start.saturating_add(size).min(data.len());
        out.extend_from_slice(&data[start..end]);
        pos = end + 2;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn warc(http: &str) -> Vec<u8> {
        format!(
            "WARC/1.0\r\nWARC-Type: response\r\nWARC-Target-URI: https://example.com/\r\n\r\n{}",
            http
        )
        .into_bytes()
    }

    #[test]
    fn test_parse_record() {
        let data = warc("HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\r\n<html></html>");
        let response = parse_record(&data).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("text/html; charset=utf-8"));
        assert_eq!(response.warc_header("warc-target-uri"), Some("https://example.com/"));
        assert_eq!(response.body, b"<html></html>");
    }

    #[test]
    fn test_parse_record_bare_newlines() {
        let data = b"WARC/1.0\nWARC-Type: response\n\nHTTP/1.0 404 Not Found\nServer: x\n\nmissing";
        let response = parse_record(data).unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, b"missing");
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(parse_record(b"<html>"), Err(Error::ArchiveFormat(_))));
        assert!(matches!(
            parse_record(b"WARC/1.0\r\nWARC-Type: response\r\n"),
            Err(Error::ArchiveFormat(_))
        ));
        assert!(matches!(
            parse_record(&warc("garbage\r\n\r\nbody")),
            Err(Error::ArchiveFormat(_))
        ));
        assert!(matches!(
            parse_record(b"WARC/1.0\r\nWARC-Type: request\r\n\r\nGET / HTTP/1.1\r\n\r\n"),
            Err(Error::ArchiveFormat(_))
        ));
    }

    #[test]
    fn test_decompress_member() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"WARC/1.0").unwrap();
        let gz = encoder.finish().unwrap();
        assert_eq!(decompress_member(&gz).unwrap(), b"WARC/1.0");
        assert!(matches!(
            decompress_member(b"not gzip at all"),
            Err(Error::ArchiveFormat(_))
        ));
    }

    #[test]
    fn test_dechunk() {
        let body = b"5;ext=1\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";
        assert_eq!(dechunk(body), b"hello world");
        assert_eq!(dechunk(b"a\r\nshort"), b"short");
    }

    #[test]
    fn test_chunked_payload() {
        let data = warc("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n");
        let response = parse_record(&data).unwrap();
        assert!(response.is_chunked());
        assert_eq!(response.payload(), b"abc");
    }
}
