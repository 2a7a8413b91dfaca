//! Shared error type for crawlers, the HTTP client, and the executor.

use thiserror::Error;

/// Shared scraper error for site detection, HTTP, parsing, and page harvesting.
#[derive(Debug, Error)]
pub enum ScraperError {
    // Site / URL
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Could not detect site from URL host '{host}'. Use --site truyenfull, truyenyy or sleepytrans.")]
    UnrecognizedHost { host: String },

    // HTTP and network
    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching {}: {url}", .context.as_deref().unwrap_or("page"))]
    HttpStatus {
        status: u16,
        url: String,
        /// Optional context (e.g. "novel page", "listing page 3").
        context: Option<String>,
    },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead { url: String, source: reqwest::Error },

    // Parsing
    #[error("Could not parse novel page: {message}")]
    ParseStoryPage { message: String },

    #[error("Could not parse chapter {id}: missing content container at {url}.")]
    ParseChapter { id: u32, url: String },

    #[error("Novel page has no chapters (possibly deleted or access restricted).")]
    EmptyChapterList,

    #[error("Invalid JSON from {url}: {source}")]
    Json {
        url: String,
        source: serde_json::Error,
    },

    // Sites and executor
    #[error("Search is not supported for {site}.")]
    SearchUnsupported { site: String },

    #[error("Background task '{task}' ended without a result.")]
    TaskAborted { task: String },
}

impl ScraperError {
    /// Label an HTTP status error with what was being fetched. Other errors pass through.
    pub fn with_context(self, what: impl Into<String>) -> Self {
        match self {
            ScraperError::HttpStatus {
                status,
                url,
                context: None,
            } => ScraperError::HttpStatus {
                status,
                url,
                context: Some(what.into()),
            },
            other => other,
        }
    }
}
