// SPDX-License-Identifier: PMPL-1.0-or-later
//! Contrastbot - WCAG AA color contrast auditing over archived web pages
//!
//! Pages are never rendered. Each domain's archived homepage is pulled out of
//! a web archive with one byte-range request, its CSS color declarations are
//! extracted from `<style>` blocks and inline styles, and every foreground and
//! background pairing is checked against the WCAG 2.x AA thresholds.
//!
//! ## Stages
//!
//! - **Archive** ([`archive`]): range fetch, gzip member inflate, WARC/HTTP unwrap, charset
//! - **Analyzers** ([`analyzers`]): color literal parsing, declaration extraction, contrast
//! - **Pipeline** ([`pipeline`]): resumable, bounded-concurrency run over many domains
//! - **Report** ([`report`]): summaries of a stored run

pub mod analyzers;
pub mod archive;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{AuditStatus, DomainAuditRecord, FetchResult, IndexRecord};
pub use pipeline::{Pipeline, RunSummary};
pub use store::{FileStore, ResultStore};
