// SPDX-License-Identifier: PMPL-1.0-or-later
//! Archive fetcher
//!
//! Resolves one index record into the archived HTML bytes with a single HTTP
//! range request. Transport failures and unexpected outer statuses are
//! retried; a corrupt gzip member or malformed record is not.

pub mod charset;
pub mod record;

use crate::config::{ArchiveConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::models::{FetchResult, IndexRecord};
use crate::scheduler::RetryPolicy;
use chrono::Utc;
use reqwest::header::{RANGE, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

pub use record::ArchivedResponse;

/// Error text recorded when the archived page itself was not a 200
pub const NOT_OK_MESSAGE: &str = "archived response not 200";

/// Range-request client for the archive host
pub struct ArchiveClient {
    client: Client,
    base_url: String,
    user_agent: String,
    retry: RetryPolicy,
}

impl ArchiveClient {
    /// Create a new archive client
    pub fn new(archive: &ArchiveConfig, retry: &RetryConfig) -> Result<Self> {
        let client = Client::builder().timeout(archive.timeout()).build()?;

        Ok(Self {
            client,
            base_url: archive.base_url.trim_end_matches('/').to_string(),
            user_agent: archive.user_agent.clone(),
            retry: RetryPolicy::from_config(retry),
        })
    }

    /// Full URL of the archive file holding this record
    pub fn record_url(&self, record: &IndexRecord) -> String {
        format!(
            "{}/{}",
            self.base_url,
            record.archive_filename.trim_start_matches('/')
        )
    }

    /// One range request, no retries
    async fn fetch_range_once(&self, record: &IndexRecord) -> Result<Vec<u8>> {
        let (start, end) = record.byte_range().ok_or_else(|| {
            Error::ArchiveFormat(format!(
                "invalid byte range for {}: offset {} length {}",
                record.domain, record.byte_offset, record.byte_length
            ))
        })?;
        let url = self.record_url(record);

        let response = self
            .client
            .get(&url)
            .header(RANGE, format!("bytes={}-{}", start, end))
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::PARTIAL_CONTENT && status != StatusCode::OK {
            return Err(Error::Network(format!(
                "range request for {} returned {}",
                record.domain, status
            )));
        }

        let bytes = response.bytes().await?;
        debug!(domain = %record.domain, bytes = bytes.len(), %status, "fetched archive range");
        Ok(bytes.to_vec())
    }

    /// Compressed record bytes, retried with backoff on transient failures
    pub async fn fetch_range(&self, record: &IndexRecord) -> Result<Vec<u8>> {
        self.retry
            .execute_auto(|| self.fetch_range_once(record))
            .await
    }

    /// Fetch, inflate and unwrap one archived page.
    ///
    /// A non-200 archived status is not an `Err`: it is reported through
    /// `FetchResult::error` with an empty payload.
    pub async fn fetch(&self, record: &IndexRecord) -> Result<FetchResult> {
        let compressed = self.fetch_range(record).await?;
        let inflated = record::decompress_member(&compressed)?;
        let response = record::parse_record(&inflated)?;
        debug!(
            domain = %record.domain,
            target = response.warc_header("WARC-Target-URI").unwrap_or("-"),
            status = response.status,
            "parsed archived response"
        );

        if response.status != 200 {
            warn!(
                domain = %record.domain,
                status = response.status,
                "archived response is not a 200"
            );
            return Ok(FetchResult {
                domain: record.domain.clone(),
                raw_html: Vec::new(),
                charset: String::new(),
                embedded_http_status: response.status,
                fetched_at: Utc::now(),
                error: Some(NOT_OK_MESSAGE.to_string()),
            });
        }

        let payload = response.payload();
        let encoding = charset::resolve_encoding(&payload, response.header("content-type"));

        Ok(FetchResult {
            domain: record.domain.clone(),
            raw_html: payload,
            charset: encoding.name().to_string(),
            embedded_http_status: response.status,
            fetched_at: Utc::now(),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(filename: &str) -> IndexRecord {
        IndexRecord {
            rank: 1,
            domain: "example.com".to_string(),
            url: "https://example.com/".to_string(),
            archive_filename: filename.to_string(),
            byte_offset: 0,
            byte_length: 10,
        }
    }

    #[test]
    fn test_record_url_joins_cleanly() {
        let archive = ArchiveConfig {
            base_url: "https://archive.test/".to_string(),
            ..ArchiveConfig::default()
        };
        let client = ArchiveClient::new(&archive, &RetryConfig::default()).unwrap();
        assert_eq!(
            client.record_url(&record("/crawl/a.warc.gz")),
            "https://archive.test/crawl/a.warc.gz"
        );
        assert_eq!(
            client.record_url(&record("crawl/a.warc.gz")),
            "https://archive.test/crawl/a.warc.gz"
        );
    }

    #[tokio::test]
    async fn test_zero_length_locator_fails_without_request() {
        let archive = ArchiveConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ArchiveConfig::default()
        };
        let client = ArchiveClient::new(&archive, &RetryConfig::default()).unwrap();
        let empty = IndexRecord {
            byte_length: 0,
            ..record("crawl/a.warc.gz")
        };

        let result = client.fetch(&empty).await;
        assert!(matches!(result, Err(Error::ArchiveFormat(_))));
    }
}
