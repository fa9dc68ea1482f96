// SPDX-License-Identifier: PMPL-1.0-or-later
//! Report generation for stored audit runs.
//!
//! Supports two output formats:
//! - Text: human-readable status counts and the worst offenders
//! - JSON: the same summary, structured

use crate::analyzers::contrast::ContrastCategory;
use crate::models::{AuditStatus, DomainAuditRecord};
use serde::Serialize;

/// How many lowest-ratio domains the summary lists
const WORST_LISTED: usize = 10;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Structured JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

/// Aggregate view over every stored domain record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreSummary {
    pub domains: usize,
    pub ok: usize,
    pub parse_empty: usize,
    pub error: usize,
    /// Domains with at least one failing pairing
    pub domains_failing: usize,
    pub pairings: usize,
    pub pairings_failing: usize,
    pub failing_normal_text: usize,
    pub failing_large_text: usize,
    pub failing_ui_component: usize,
    /// Lowest-ratio domains, ascending
    pub worst: Vec<WorstDomain>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorstDomain {
    pub domain: String,
    pub rank: u32,
    pub worst_ratio: f64,
    pub fail_count: usize,
}

impl StoreSummary {
    pub fn from_records(records: &[DomainAuditRecord]) -> Self {
        let mut summary = StoreSummary {
            domains: records.len(),
            ..Default::default()
        };

        for record in records {
            match record.status {
                AuditStatus::Ok => summary.ok += 1,
                AuditStatus::ParseEmpty => summary.parse_empty += 1,
                AuditStatus::Error => summary.error += 1,
            }
            if record.fail_count > 0 {
                summary.domains_failing += 1;
            }
            summary.pairings += record.total();
            summary.pairings_failing += record.fail_count;

            for result in record.results.iter().filter(|r| !r.passes) {
                match result.category {
                    ContrastCategory::NormalText => summary.failing_normal_text += 1,
                    ContrastCategory::LargeText => summary.failing_large_text += 1,
                    ContrastCategory::UiComponent => summary.failing_ui_component += 1,
                }
            }
        }

        let mut worst: Vec<WorstDomain> = records
            .iter()
            .filter_map(|r| {
                Some(WorstDomain {
                    domain: r.domain.clone(),
                    rank: r.rank,
                    worst_ratio: r.worst_ratio?,
                    fail_count: r.fail_count,
                })
            })
            .collect();
        worst.sort_by(|a, b| {
            a.worst_ratio
                .total_cmp(&b.worst_ratio)
                .then_with(|| a.rank.cmp(&b.rank))
        });
        worst.truncate(WORST_LISTED);
        summary.worst = worst;

        summary
    }

    /// Share of evaluated domains with at least one failing pairing
    pub fn failing_share(&self) -> f64 {
        if self.ok == 0 {
            0.0
        } else {
            self.domains_failing as f64 / self.ok as f64
        }
    }
}

/// Render a summary of stored records
pub fn generate_summary(records: &[DomainAuditRecord], format: OutputFormat) -> String {
    let summary = StoreSummary::from_records(records);
    match format {
        OutputFormat::Text => summary_text(&summary),
        OutputFormat::Json => to_json(&summary),
    }
}

fn summary_text(summary: &StoreSummary) -> String {
    let mut output = String::new();

    output.push_str("=== Contrastbot WCAG AA Contrast Summary ===\n\n");

    if summary.domains == 0 {
        output.push_str("No audit records found.\n");
        return output;
    }

    output.push_str(&format!(
        "Domains: {} (ok: {}, parse_empty: {}, error: {})\n",
        summary.domains, summary.ok, summary.parse_empty, summary.error
    ));
    output.push_str(&format!(
        "Domains with failures: {} ({:.1}% of evaluated)\n",
        summary.domains_failing,
        summary.failing_share() * 100.0
    ));
    output.push_str(&format!(
        "Pairings: {} evaluated, {} failing (normal text: {}, large text: {}, ui component: {})\n",
        summary.pairings,
        summary.pairings_failing,
        summary.failing_normal_text,
        summary.failing_large_text,
        summary.failing_ui_component
    ));

    if !summary.worst.is_empty() {
        output.push_str("\n--- Lowest contrast ---\n");
        for entry in &summary.worst {
            output.push_str(&format!(
                "#{:<5} {:<40} {:>5.2}:1  ({} failing)\n",
                entry.rank, entry.domain, entry.worst_ratio, entry.fail_count
            ));
        }
    }

    output
}

/// Render one domain's audit record
pub fn generate_record_report(record: &DomainAuditRecord, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(record),
        OutputFormat::Text => record_text(record),
    }
}

fn record_text(record: &DomainAuditRecord) -> String {
    let mut output = String::new();
    output.push_str(&format!("{} [{}]\n", record.domain, record.status));

    if let Some(ref error) = record.error {
        output.push_str(&format!("  Error: {}\n", error));
    }
    if record.results.is_empty() {
        return output;
    }

    output.push_str(&format!(
        "  {} pairing(s): {} pass, {} fail\n",
        record.total(),
        record.pass_count,
        record.fail_count
    ));
    for result in &record.results {
        let verdict = if result.passes { "PASS" } else { "FAIL" };
        output.push_str(&format!(
            "  [{}] group {:>3}  {} on {}  {:.2}:1 (needs {:.1}, {})\n",
            verdict,
            result.pairing.group_id,
            result.pairing.foreground,
            result.pairing.background,
            result.ratio,
            result.threshold,
            result.category
        ));
    }

    output
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize report: {}\"}}", e))
}
