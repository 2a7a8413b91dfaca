//! novelscrape: CLI scraper for Vietnamese web-novel sites and Sleepy Translations, outputting JSON.

pub mod cli;
pub mod config;
pub mod model;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use crate::model::{ChapterRef, Novel, SearchResult, VolumeRef};
pub use crate::scraper::executor::{submit, Executor, TaskHandle, ThreadPool};
pub use crate::scraper::harvest::{ChapterList, Harvester};
pub use crate::scraper::{
    crawler_for, resolve_site, CrawlContext, Crawler, Fetcher, HttpClient, HttpClientBuilder,
    ScraperError, Site,
};
