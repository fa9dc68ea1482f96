// SPDX-License-Identifier: PMPL-1.0-or-later
//! Records exchanged between the pipeline stages and the result store

use crate::analyzers::contrast::ContrastResult;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Archive locator for one domain, produced by the index lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub rank: u32,
    pub domain: String,
    #[serde(default)]
    pub url: String,
    #[serde(alias = "filename")]
    pub archive_filename: String,
    #[serde(alias = "offset")]
    pub byte_offset: u64,
    #[serde(alias = "length")]
    pub byte_length: u64,
}

impl IndexRecord {
    /// Inclusive byte range of the record, as used in the `Range` header.
    ///
    /// `None` for a zero-length locator or one whose end overflows `u64`.
    pub fn byte_range(&self) -> Option<(u64, u64)> {
        let last = self.byte_length.checked_sub(1)?;
        let end = self.byte_offset.checked_add(last)?;
        Some((self.byte_offset, end))
    }
}

/// Index lookup output as written by the lookup step, before filtering
#[derive(Debug, Deserialize)]
struct IndexEntry {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    rank: Option<u32>,
    domain: String,
    #[serde(default)]
    url: String,
    #[serde(alias = "filename", default)]
    archive_filename: Option<String>,
    #[serde(alias = "offset", default)]
    byte_offset: Option<u64>,
    #[serde(alias = "length", default)]
    byte_length: Option<u64>,
}

/// Load index records from a JSON array.
///
/// Entries whose `status` is present and not `found`, or that lack a usable
/// locator, are skipped. A missing rank becomes the 1-based list position.
pub fn load_index(path: &Path) -> Result<Vec<IndexRecord>> {
    let content = std::fs::read_to_string(path)?;
    let entries: Vec<IndexEntry> = serde_json::from_str(&content)?;
    let total = entries.len();

    let records: Vec<IndexRecord> = entries
        .into_iter()
        .enumerate()
        .filter(|(_, e)| e.status.as_deref().map_or(true, |s| s == "found"))
        .filter_map(|(idx, e)| {
            Some(IndexRecord {
                rank: e.rank.unwrap_or(idx as u32 + 1),
                domain: e.domain,
                url: e.url,
                archive_filename: e.archive_filename?,
                byte_offset: e.byte_offset?,
                byte_length: e.byte_length?,
            })
        })
        .filter(|r| {
            if r.byte_range().is_some() {
                return true;
            }
            warn!(
                domain = %r.domain,
                offset = r.byte_offset,
                length = r.byte_length,
                "skipping index entry with invalid byte range"
            );
            false
        })
        .collect();

    debug!(total, usable = records.len(), path = %path.display(), "loaded index records");
    Ok(records)
}

/// What the archive returned for one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub domain: String,
    /// Payload bytes; persisted next to the metadata, not inside it
    #[serde(skip)]
    pub raw_html: Vec<u8>,
    /// Encoding label used to decode the payload
    pub charset: String,
    pub embedded_http_status: u16,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchResult {
    pub fn is_usable(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome category of a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Ok,
    ParseEmpty,
    Error,
}

impl AuditStatus {
    /// Completed domains are skipped on resume; errors are retried
    pub fn is_complete(&self) -> bool {
        matches!(self, AuditStatus::Ok | AuditStatus::ParseEmpty)
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditStatus::Ok => write!(f, "ok"),
            AuditStatus::ParseEmpty => write!(f, "parse_empty"),
            AuditStatus::Error => write!(f, "error"),
        }
    }
}

/// The per-domain verdict, one per domain per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAuditRecord {
    pub domain: String,
    pub rank: u32,
    pub status: AuditStatus,
    #[serde(default)]
    pub results: Vec<ContrastResult>,
    pub pass_count: usize,
    pub fail_count: usize,
    /// Lowest ratio among the results
    pub worst_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainAuditRecord {
    /// Aggregate evaluated results; an empty set is `parse_empty`
    pub fn from_results(record: &IndexRecord, results: Vec<ContrastResult>) -> Self {
        if results.is_empty() {
            return Self::parse_empty(record);
        }
        let pass_count = results.iter().filter(|r| r.passes).count();
        let worst_ratio = results.iter().map(|r| r.ratio).reduce(f64::min);
        Self {
            domain: record.domain.clone(),
            rank: record.rank,
            status: AuditStatus::Ok,
            fail_count: results.len() - pass_count,
            pass_count,
            worst_ratio,
            results,
            error: None,
        }
    }

    pub fn parse_empty(record: &IndexRecord) -> Self {
        Self::empty(record, AuditStatus::ParseEmpty, None)
    }

    pub fn failed(record: &IndexRecord, cause: impl Into<String>) -> Self {
        Self::empty(record, AuditStatus::Error, Some(cause.into()))
    }

    fn empty(record: &IndexRecord, status: AuditStatus, error: Option<String>) -> Self {
        Self {
            domain: record.domain.clone(),
            rank: record.rank,
            status,
            results: Vec::new(),
            pass_count: 0,
            fail_count: 0,
            worst_ratio: None,
            error,
        }
    }

    /// The single lowest-ratio result
    pub fn worst_result(&self) -> Option<&ContrastResult> {
        self.results
            .iter()
            .min_by(|a, b| a.ratio.total_cmp(&b.ratio))
    }

    pub fn total(&self) -> usize {
        self.pass_count + self.fail_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::analyze_html;

    fn index_record() -> IndexRecord {
        IndexRecord {
            rank: 3,
            domain: "example.com".to_string(),
            url: "https://example.com/".to_string(),
            archive_filename: "crawl/segment/warc/file.warc.gz".to_string(),
            byte_offset: 1000,
            byte_length: 500,
        }
    }

    #[test]
    fn test_byte_range_is_inclusive() {
        assert_eq!(index_record().byte_range(), Some((1000, 1499)));
    }

    #[test]
    fn test_byte_range_rejects_empty_and_overflowing_locators() {
        let empty = IndexRecord {
            byte_length: 0,
            ..index_record()
        };
        assert_eq!(empty.byte_range(), None);

        let overflowing = IndexRecord {
            byte_offset: u64::MAX,
            byte_length: 2,
            ..index_record()
        };
        assert_eq!(overflowing.byte_range(), None);

        let last_byte = IndexRecord {
            byte_offset: u64::MAX,
            byte_length: 1,
            ..index_record()
        };
        assert_eq!(last_byte.byte_range(), Some((u64::MAX, u64::MAX)));
    }

    #[test]
    fn test_aggregate_counts_and_worst() {
        let results = analyze_html(
            "<style>a { color: #000; background: #fff } b { color: #aaa; background: #ccc }</style>",
        )
        .unwrap();
        let audit = DomainAuditRecord::from_results(&index_record(), results);
        assert_eq!(audit.status, AuditStatus::Ok);
        assert_eq!(audit.pass_count, 1);
        assert_eq!(audit.fail_count, 1);
        assert_eq!(audit.total(), 2);
        let worst = audit.worst_result().unwrap();
        assert_eq!(Some(worst.ratio), audit.worst_ratio);
        assert!(worst.ratio < 2.0);
    }

    #[test]
    fn test_no_results_is_parse_empty() {
        let audit = DomainAuditRecord::from_results(&index_record(), Vec::new());
        assert_eq!(audit.status, AuditStatus::ParseEmpty);
        assert_eq!(audit.worst_ratio, None);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&AuditStatus::ParseEmpty).unwrap(), "\"parse_empty\"");
        assert!(AuditStatus::Ok.is_complete());
        assert!(AuditStatus::ParseEmpty.is_complete());
        assert!(!AuditStatus::Error.is_complete());
    }

    #[test]
    fn test_load_index_filters_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(
            &path,
            r#"[
                {"status": "found", "domain": "a.com", "url": "https://a.com/",
                 "filename": "x.warc.gz", "offset": 10, "length": 20},
                {"status": "not_found", "domain": "b.com"},
                {"rank": 7, "domain": "c.com", "archive_filename": "y.warc.gz",
                 "byte_offset": 5, "byte_length": 6}
            ]"#,
        )
        .unwrap();

        let records = load_index(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rank, 1);
        assert_eq!(records[0].archive_filename, "x.warc.gz");
        assert_eq!(records[1].rank, 7);
        assert_eq!(records[1].byte_range(), Some((5, 10)));
    }

    #[test]
    fn test_load_index_skips_invalid_locators() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(
            &path,
            r#"[
                {"domain": "empty.com", "filename": "x.warc.gz", "offset": 10, "length": 0},
                {"domain": "huge.com", "filename": "x.warc.gz",
                 "offset": 18446744073709551615, "length": 5},
                {"domain": "fine.com", "filename": "x.warc.gz", "offset": 0, "length": 1}
            ]"#,
        )
        .unwrap();

        let records = load_index(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].domain, "fine.com");
        assert_eq!(records[0].rank, 3);
        assert_eq!(records[0].byte_range(), Some((0, 0)));
    }
}
