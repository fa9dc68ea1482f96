// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for contrastbot

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for contrastbot
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure, timeout or a non-2xx answer from the archive host.
    #[error("Network error: {0}")]
    Network(String),

    /// Bad gzip member or malformed WARC/HTTP framing.
    #[error("Archive format error: {0}")]
    ArchiveFormat(String),

    /// Empty document or no color declarations at all.
    #[error("No content: {0}")]
    NoContent(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether the archive fetch that produced this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Http(err) => !err.is_builder(),
            Error::ArchiveFormat(_)
            | Error::NoContent(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_) => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
