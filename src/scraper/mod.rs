//! Site adapters and scraping. Site detection, crawler trait, shared client, executor, and adapters.

mod client;
mod error;

pub mod cleaner;
pub mod executor;
pub mod harvest;
pub mod sleepytrans;
pub mod truyenfull;
pub mod truyenyy;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{Fetcher, HttpClient, HttpClientBuilder};
pub use error::ScraperError;

use crate::model::{ChapterRef, Novel, SearchResult};
use executor::Executor;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::sync::Arc;

/// Supported fiction site. Used for dispatch and for --site override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    TruyenFull,
    TruyenYY,
    SleepyTranslations,
}

impl Site {
    pub const ALL: [Site; 3] = [Site::TruyenFull, Site::TruyenYY, Site::SleepyTranslations];

    /// Hosts served by this adapter, as base URLs.
    pub fn base_urls(self) -> &'static [&'static str] {
        match self {
            Site::TruyenFull => truyenfull::BASE_URLS,
            Site::TruyenYY => truyenyy::BASE_URLS,
            Site::SleepyTranslations => sleepytrans::BASE_URLS,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Site::TruyenFull => "truyenfull",
            Site::TruyenYY => "truyenyy",
            Site::SleepyTranslations => "sleepytrans",
        };
        f.write_str(name)
    }
}

/// Resolve which site to use from URL and optional override.
pub fn resolve_site(url_input: &str, override_site: Option<Site>) -> Result<Site, ScraperError> {
    if let Some(site) = override_site {
        return Ok(site);
    }
    let url = Url::parse(url_input).map_err(|e| ScraperError::InvalidUrl {
        input: url_input.to_string(),
        reason: e.to_string(),
    })?;
    let host = url.host_str().ok_or_else(|| ScraperError::InvalidUrl {
        input: url_input.to_string(),
        reason: "URL has no host".to_string(),
    })?;
    Site::ALL
        .into_iter()
        .find(|site| {
            site.base_urls().iter().any(|base| {
                Url::parse(base)
                    .ok()
                    .and_then(|b| b.host_str().map(|h| host_matches(host, h)))
                    .unwrap_or(false)
            })
        })
        .ok_or_else(|| ScraperError::UnrecognizedHost {
            host: host.to_string(),
        })
}

/// `host` is `site_host` or one of its subdomains (e.g. `www.`).
fn host_matches(host: &str, site_host: &str) -> bool {
    host == site_host || host.ends_with(&format!(".{}", site_host))
}

/// Services a crawler consumes: document fetching and concurrent task execution.
#[derive(Clone)]
pub struct CrawlContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub executor: Arc<dyn Executor>,
}

impl CrawlContext {
    pub fn new(fetcher: Arc<dyn Fetcher>, executor: Arc<dyn Executor>) -> Self {
        Self { fetcher, executor }
    }
}

/// Trait implemented by site adapters.
///
/// `read_novel_info` returns the [Novel] with its full chapter list (no bodies);
/// bodies are fetched one chapter at a time with `download_chapter_body`.
pub trait Crawler: Send + Sync {
    fn site(&self) -> Site;

    fn search_novel(&self, _query: &str) -> Result<Vec<SearchResult>, ScraperError> {
        Err(ScraperError::SearchUnsupported {
            site: self.site().to_string(),
        })
    }

    fn read_novel_info(&self, novel_url: &str) -> Result<Novel, ScraperError>;

    /// Chapter body as minimal HTML (`<p>...</p>` only).
    fn download_chapter_body(&self, chapter: &ChapterRef) -> Result<String, ScraperError>;
}

/// Build the adapter for `site`.
pub fn crawler_for(site: Site, ctx: CrawlContext) -> Result<Arc<dyn Crawler>, ScraperError> {
    Ok(match site {
        Site::TruyenFull => Arc::new(truyenfull::TruyenFullCrawler::new(ctx)?),
        Site::TruyenYY => Arc::new(truyenyy::TruyenYYCrawler::new(ctx)?),
        Site::SleepyTranslations => Arc::new(sleepytrans::SleepyTranslationsCrawler::new(ctx)?),
    })
}

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
pub(crate) fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::ParseStoryPage {
        message: format!("invalid selector {:?}: {}", sel, e),
    })
}

/// Resolve `href` against `base`. Returns `href` unchanged if either does not parse.
pub fn absolute_url(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href.trim()))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Collected, trimmed text of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Trimmed text of the first match under `scope`, or empty.
pub(crate) fn select_text(scope: ElementRef<'_>, sel: &Selector) -> String {
    scope.select(sel).next().map(element_text).unwrap_or_default()
}

/// Attribute of the first match under `scope`, if present and non-empty.
pub(crate) fn select_attr(scope: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    scope
        .select(sel)
        .next()
        .and_then(|e| e.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Selectors for the book-list markup shared by the "truyen" family of sites.
pub(crate) struct BookListSelectors {
    row: Selector,
    title_link: Selector,
    status: Selector,
    author: Selector,
    latest: Selector,
}

impl BookListSelectors {
    pub(crate) fn new() -> Result<Self, ScraperError> {
        Ok(Self {
            row: parse_selector(".cate-list-books .list-item")?,
            title_link: parse_selector(".truyen-title a")?,
            status: parse_selector(".status-info")?,
            author: parse_selector(".author")?,
            latest: parse_selector(".item-col.text-info a")?,
        })
    }

    /// Search hits from a book-list page. Rows without a title link are skipped.
    pub(crate) fn parse(&self, html: &str, base: &str) -> Vec<SearchResult> {
        let doc = Html::parse_document(html);
        doc.select(&self.row)
            .filter_map(|row| {
                let a = row.select(&self.title_link).next()?;
                let href = a.value().attr("href")?;
                let info = [
                    select_text(row, &self.latest),
                    select_text(row, &self.author),
                    select_text(row, &self.status),
                ]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" | ");
                Some(SearchResult {
                    title: element_text(a),
                    url: absolute_url(base, href),
                    info,
                })
            })
            .collect()
    }
}
