// SPDX-License-Identifier: PMPL-1.0-or-later
//! Audit pipeline orchestrator
//!
//! Runs fetch, extraction and evaluation for every index record on a bounded
//! pool of tokio tasks. A failure at any stage, a panic included, becomes an
//! `error` record for that domain and never stops the run.

use crate::analyzers::analyze_html;
use crate::archive::{charset, ArchiveClient};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{AuditStatus, DomainAuditRecord, FetchResult, IndexRecord};
use crate::scheduler::WorkerLimiter;
use crate::store::ResultStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-status counts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ok: usize,
    pub parse_empty: usize,
    pub error: usize,
    /// Domains skipped because a completed record already existed
    pub skipped: usize,
}

impl RunSummary {
    pub fn record(&mut self, status: AuditStatus) {
        match status {
            AuditStatus::Ok => self.ok += 1,
            AuditStatus::ParseEmpty => self.parse_empty += 1,
            AuditStatus::Error => self.error += 1,
        }
    }

    /// Domains processed in this run
    pub fn processed(&self) -> usize {
        self.ok + self.parse_empty + self.error
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ok={} parse_empty={} error={} skipped={}",
            self.ok, self.parse_empty, self.error, self.skipped
        )
    }
}

/// The resumable, bounded-concurrency audit run
pub struct Pipeline {
    client: Arc<ArchiveClient>,
    store: Arc<dyn ResultStore>,
    limiter: WorkerLimiter,
    resume: bool,
}

impl Pipeline {
    pub fn new(config: &Config, store: Arc<dyn ResultStore>) -> Result<Self> {
        config.validate()?;
        let client = ArchiveClient::new(&config.archive, &config.retry)?;

        Ok(Self {
            client: Arc::new(client),
            store,
            limiter: WorkerLimiter::new(config.pipeline.workers, config.pipeline.delay()),
            resume: config.pipeline.resume,
        })
    }

    /// Audit every record and write one result per domain.
    ///
    /// Only a failure to read the existing store on resume is returned as an
    /// error; everything per domain is folded into its record.
    pub async fn run(&self, records: &[IndexRecord]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        let completed = if self.resume {
            self.store.load_completed()?
        } else {
            Default::default()
        };

        let mut handles = Vec::new();
        for record in records {
            if completed.contains(&record.domain) {
                debug!(domain = %record.domain, "already complete, skipping");
                summary.skipped += 1;
                continue;
            }

            let client = Arc::clone(&self.client);
            let store = Arc::clone(&self.store);
            let limiter = self.limiter.clone();
            let task_record = record.clone();
            let resume = self.resume;

            let handle = tokio::spawn(async move {
                let _permit = limiter.acquire().await?;
                let cached = if resume {
                    resume_cache(store.as_ref(), &task_record.domain)
                } else {
                    None
                };
                let audit = audit_domain(&client, store.as_ref(), &task_record, cached).await;
                Ok::<_, Error>(persist(store.as_ref(), &audit))
            });
            handles.push((record.clone(), handle));
        }

        info!(
            queued = handles.len(),
            skipped = summary.skipped,
            workers = self.limiter.capacity(),
            "audit run started"
        );

        // Workers write their own records; only failures outside a worker land here
        for (record, handle) in handles {
            let status = match handle.await {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    persist(self.store.as_ref(), &DomainAuditRecord::failed(&record, e.to_string()))
                }
                Err(join_error) => {
                    warn!(domain = %record.domain, "worker aborted: {}", join_error);
                    let audit =
                        DomainAuditRecord::failed(&record, format!("worker aborted: {}", join_error));
                    persist(self.store.as_ref(), &audit)
                }
            };
            summary.record(status);
        }

        info!(%summary, "audit run finished");
        Ok(summary)
    }
}

/// Write a domain's record. A record that could not be written counts as an
/// error, since a resumed run will process that domain again.
fn persist(store: &dyn ResultStore, audit: &DomainAuditRecord) -> AuditStatus {
    match store.save_record(audit) {
        Ok(()) => audit.status,
        Err(e) => {
            warn!(domain = %audit.domain, "failed to write audit record: {}", e);
            AuditStatus::Error
        }
    }
}

/// A previously cached, usable fetch for this domain
fn resume_cache(store: &dyn ResultStore, domain: &str) -> Option<FetchResult> {
    match store.load_fetch(domain) {
        Ok(Some(fetch)) if fetch.is_usable() => Some(fetch),
        Ok(_) => None,
        Err(e) => {
            debug!(domain = %domain, "ignoring unreadable fetch cache: {}", e);
            None
        }
    }
}

/// Fetch (or reuse) and evaluate one domain
pub async fn audit_domain(
    client: &ArchiveClient,
    store: &dyn ResultStore,
    record: &IndexRecord,
    cached: Option<FetchResult>,
) -> DomainAuditRecord {
    let fetch = match cached {
        Some(fetch) => {
            debug!(domain = %record.domain, "using cached fetch");
            fetch
        }
        None => match client.fetch(record).await {
            Ok(fetch) => {
                if let Err(e) = store.save_fetch(&fetch) {
                    warn!(domain = %record.domain, "failed to cache fetch: {}", e);
                }
                fetch
            }
            Err(e) => {
                warn!(domain = %record.domain, "fetch failed: {}", e);
                return DomainAuditRecord::failed(record, e.to_string());
            }
        },
    };

    evaluate_fetch(record, &fetch)
}

/// Turn a fetch result into the domain's audit record
pub fn evaluate_fetch(record: &IndexRecord, fetch: &FetchResult) -> DomainAuditRecord {
    if let Some(cause) = &fetch.error {
        warn!(domain = %record.domain, status = fetch.embedded_http_status, "{}", cause);
        return DomainAuditRecord::failed(record, cause.clone());
    }

    let decoded = charset::decode_with_label(&fetch.raw_html, &fetch.charset);
    if decoded.had_errors {
        warn!(
            domain = %record.domain,
            charset = decoded.charset,
            "payload contained undecodable bytes, replaced"
        );
    }

    match analyze_html(&decoded.text) {
        Ok(results) => {
            let audit = DomainAuditRecord::from_results(record, results);
            debug!(
                domain = %record.domain,
                pass = audit.pass_count,
                fail = audit.fail_count,
                "domain evaluated"
            );
            audit
        }
        Err(Error::NoContent(reason)) => {
            debug!(domain = %record.domain, "{}", reason);
            DomainAuditRecord::parse_empty(record)
        }
        Err(e) => {
            warn!(domain = %record.domain, "analysis failed: {}", e);
            DomainAuditRecord::failed(record, e.to_string())
        }
    }
}
