// SPDX-License-Identifier: PMPL-1.0-or-later
//! Resumable result store
//!
//! One file per domain, so no two workers ever write the same path. Every
//! write goes to a temporary file in the target directory and is renamed into
//! place, so a reader sees either the previous file or the complete new one.

use crate::error::Result;
use crate::models::{DomainAuditRecord, FetchResult};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Storage for per-domain audit records and cached fetches
pub trait ResultStore: Send + Sync {
    /// Domains whose stored record is `ok` or `parse_empty`
    fn load_completed(&self) -> Result<HashSet<String>>;

    /// Atomically write the audit record for one domain
    fn save_record(&self, record: &DomainAuditRecord) -> Result<()>;

    /// All stored audit records, ordered by domain
    fn load_records(&self) -> Result<Vec<DomainAuditRecord>>;

    /// Atomically write a fetch result, payload included
    fn save_fetch(&self, fetch: &FetchResult) -> Result<()>;

    /// Cached fetch result for a domain, if any
    fn load_fetch(&self, domain: &str) -> Result<Option<FetchResult>>;
}

/// File-per-domain JSON store rooted at the output directory
pub struct FileStore {
    base_path: PathBuf,
}

/// Filesystem-safe key for a domain.
///
/// Bytes outside `[A-Za-z0-9._-]` are percent-encoded, `%` included, so
/// distinct domains never share a key.
pub fn safe_name(domain: &str) -> String {
    let mut key = String::with_capacity(domain.len());
    for byte in domain.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_') {
            key.push(byte as char);
        } else {
            key.push_str(&format!("%{:02X}", byte));
        }
    }
    key
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn records_dir(&self) -> PathBuf {
        self.base_path.join("records")
    }

    fn fetched_dir(&self) -> PathBuf {
        self.base_path.join("fetched")
    }

    fn record_path(&self, domain: &str) -> PathBuf {
        self.records_dir().join(format!("{}.json", safe_name(domain)))
    }
}

/// Write-then-rename in the destination directory
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

impl ResultStore for FileStore {
    fn load_completed(&self) -> Result<HashSet<String>> {
        let completed: HashSet<String> = self
            .load_records()?
            .into_iter()
            .filter(|r| r.status.is_complete())
            .map(|r| r.domain)
            .collect();

        debug!(completed = completed.len(), "loaded completed domains");
        Ok(completed)
    }

    fn save_record(&self, record: &DomainAuditRecord) -> Result<()> {
        let path = self.record_path(&record.domain);
        let json = serde_json::to_vec_pretty(record)?;
        atomic_write(&path, &json)?;

        debug!(path = %path.display(), domain = %record.domain, status = %record.status, "saved audit record");
        Ok(())
    }

    fn load_records(&self) -> Result<Vec<DomainAuditRecord>> {
        let mut records = Vec::new();
        for path in json_files(&self.records_dir())? {
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<DomainAuditRecord>(&content) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), "skipping unreadable record: {}", e),
            }
        }
        records.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(records)
    }

    fn save_fetch(&self, fetch: &FetchResult) -> Result<()> {
        let key = safe_name(&fetch.domain);
        let dir = self.fetched_dir();

        // Payload first: metadata marks the cache entry as complete
        atomic_write(&dir.join(format!("{}.html", key)), &fetch.raw_html)?;
        let meta = serde_json::to_vec_pretty(fetch)?;
        atomic_write(&dir.join(format!("{}.json", key)), &meta)?;

        debug!(domain = %fetch.domain, bytes = fetch.raw_html.len(), "cached fetch result");
        Ok(())
    }

    fn load_fetch(&self, domain: &str) -> Result<Option<FetchResult>> {
        let key = safe_name(domain);
        let meta_path = self.fetched_dir().join(format!("{}.json", key));
        if !meta_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&meta_path)?;
        let mut fetch: FetchResult = serde_json::from_str(&content)?;

        let html_path = self.fetched_dir().join(format!("{}.html", key));
        if html_path.exists() {
            fetch.raw_html = std::fs::read(&html_path)?;
        }
        Ok(Some(fetch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditStatus, IndexRecord};
    use chrono::Utc;

    fn index_record(domain: &str) -> IndexRecord {
        IndexRecord {
            rank: 1,
            domain: domain.to_string(),
            url: format!("https://{}/", domain),
            archive_filename: "a.warc.gz".to_string(),
            byte_offset: 0,
            byte_length: 1,
        }
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(safe_name("example.com"), "example.com");
        assert_eq!(safe_name("example.com:8080/path"), "example.com%3A8080%2Fpath");
        assert_eq!(safe_name("a\\b%c"), "a%5Cb%25c");
    }

    #[test]
    fn test_safe_name_is_collision_free() {
        let keys: HashSet<String> = ["a:b", "a_b", "a/b", "a%3Ab", "a\\b"]
            .iter()
            .map(|d| safe_name(d))
            .collect();
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn test_similar_domains_stored_separately() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store
            .save_record(&DomainAuditRecord::failed(&index_record("a:b"), "boom"))
            .unwrap();
        store
            .save_record(&DomainAuditRecord::parse_empty(&index_record("a_b")))
            .unwrap();

        let records = store.load_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].domain, "a:b");
        assert_eq!(records[0].status, AuditStatus::Error);
        assert_eq!(records[1].domain, "a_b");
        assert_eq!(records[1].status, AuditStatus::ParseEmpty);
    }

    #[test]
    fn test_record_round_trip_and_completed_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store
            .save_record(&DomainAuditRecord::parse_empty(&index_record("b.com")))
            .unwrap();
        store
            .save_record(&DomainAuditRecord::failed(&index_record("a.com"), "boom"))
            .unwrap();

        let records = store.load_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].domain, "a.com");
        assert_eq!(records[0].status, AuditStatus::Error);

        let completed = store.load_completed().unwrap();
        assert!(completed.contains("b.com"));
        assert!(!completed.contains("a.com"));
    }

    #[test]
    fn test_overwrite_replaces_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let record = index_record("a.com");

        store.save_record(&DomainAuditRecord::failed(&record, "first")).unwrap();
        store.save_record(&DomainAuditRecord::parse_empty(&record)).unwrap();

        let records = store.load_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AuditStatus::ParseEmpty);
        assert!(records[0].error.is_none());
    }

    #[test]
    fn test_unreadable_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("records")).unwrap();
        std::fs::write(dir.path().join("records/junk.json"), "{not json").unwrap();
        assert!(store.load_records().unwrap().is_empty());
    }

    #[test]
    fn test_fetch_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.load_fetch("a.com").unwrap().is_none());

        let fetch = FetchResult {
            domain: "a.com".to_string(),
            raw_html: b"<p style=\"color:red\">x</p>".to_vec(),
            charset: "UTF-8".to_string(),
            embedded_http_status: 200,
            fetched_at: Utc::now(),
            error: None,
        };
        store.save_fetch(&fetch).unwrap();

        let loaded = store.load_fetch("a.com").unwrap().unwrap();
        assert_eq!(loaded, fetch);
    }
}
