// SPDX-License-Identifier: PMPL-1.0-or-later
//! Contrastbot CLI - WCAG AA color contrast auditing over archived web pages

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use contrastbot::analyzers::analyze_html;
use contrastbot::archive::charset;
use contrastbot::report::{generate_record_report, generate_summary, OutputFormat};
use contrastbot::{Config, DomainAuditRecord, Error, FileStore, IndexRecord, Pipeline, ResultStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// WCAG AA color contrast auditor for archived web pages
#[derive(Parser)]
#[command(name = "contrastbot")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and audit every domain of an index file
    Run {
        /// JSON index of archive locators
        #[arg(long)]
        index: PathBuf,

        /// Configuration file
        #[arg(long, default_value = "contrastbot.toml")]
        config: PathBuf,

        /// Concurrent domain workers
        #[arg(long)]
        workers: Option<usize>,

        /// Delay before each archive request (milliseconds)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Skip domains already recorded as ok or parse_empty
        #[arg(long)]
        resume: bool,

        /// Total attempts per archive request
        #[arg(long)]
        max_attempts: Option<usize>,

        /// Archive host base URL
        #[arg(long)]
        archive_url: Option<String>,

        /// Result store directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(long, short)]
        verbose: bool,
    },

    /// Audit a local HTML file
    Analyze {
        /// HTML file to analyze
        file: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        format: FormatArg,

        /// Enable verbose logging
        #[arg(long, short)]
        verbose: bool,
    },

    /// Summarize a stored run
    Summary {
        /// Result store directory
        dir: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: FormatArg,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Enable verbose logging
        #[arg(long, short)]
        verbose: bool,
    },
}

/// Output format CLI argument
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Human-readable text
    Text,
    /// Structured JSON
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("contrastbot=debug")
    } else {
        EnvFilter::new("contrastbot=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            index,
            config,
            workers,
            delay_ms,
            resume,
            max_attempts,
            archive_url,
            output_dir,
            verbose,
        } => {
            init_logging(verbose);

            let mut config = Config::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            if let Some(workers) = workers {
                config.pipeline.workers = workers;
            }
            if let Some(delay_ms) = delay_ms {
                config.pipeline.delay_ms = delay_ms;
            }
            if resume {
                config.pipeline.resume = true;
            }
            if let Some(max_attempts) = max_attempts {
                config.retry.max_attempts = max_attempts;
            }
            if let Some(url) = archive_url {
                config.archive.base_url = url;
            }
            if let Some(dir) = output_dir {
                config.pipeline.output_dir = dir;
            }

            let records = contrastbot::models::load_index(&index)
                .with_context(|| format!("reading index {}", index.display()))?;
            let store = Arc::new(FileStore::new(&config.pipeline.output_dir));
            let pipeline = Pipeline::new(&config, store)?;
            let summary = pipeline.run(&records).await?;

            println!(
                "ok: {}  parse_empty: {}  error: {}  skipped: {}",
                summary.ok, summary.parse_empty, summary.error, summary.skipped
            );
        }

        Commands::Analyze { file, format, verbose } => {
            init_logging(verbose);
            let audit = analyze_file(&file)?;
            println!("{}", generate_record_report(&audit, format.into()));

            if audit.fail_count > 0 {
                std::process::exit(1);
            }
        }

        Commands::Summary { dir, format, output, verbose } => {
            init_logging(verbose);
            let records = FileStore::new(&dir).load_records()?;
            let report = generate_summary(&records, format.into());
            write_output(&report, output.as_deref())?;
        }
    }

    Ok(())
}

/// Audit a local file the same way an archived payload is audited
fn analyze_file(path: &Path) -> anyhow::Result<DomainAuditRecord> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let decoded = charset::decode(&bytes, charset::resolve_encoding(&bytes, None));

    let record = IndexRecord {
        rank: 0,
        domain: path.display().to_string(),
        url: String::new(),
        archive_filename: String::new(),
        byte_offset: 0,
        byte_length: 0,
    };

    match analyze_html(&decoded.text) {
        Ok(results) => Ok(DomainAuditRecord::from_results(&record, results)),
        Err(Error::NoContent(_)) => Ok(DomainAuditRecord::parse_empty(&record)),
        Err(e) => Err(e.into()),
    }
}

/// Write output to file or stdout
fn write_output(content: &str, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(p) => {
            std::fs::write(p, content)?;
            eprintln!("Report written to {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
