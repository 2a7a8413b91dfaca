//! Paginated chapter-list harvesting.
//!
//! A listing split across several pages is merged into one [ChapterList].
//! Pages beyond the first are fetched concurrently on an [Executor], but their
//! links are appended strictly in page order: handles are awaited in
//! submission order, never in completion order. Chapter and volume ids are a
//! pure function of the list length at append time, so this ordering is what
//! keeps ids stable.

use crate::model::{volume_for_len, ChapterRef, VolumeRef, CHAPTERS_PER_VOLUME};
use crate::scraper::client::Fetcher;
use crate::scraper::error::ScraperError;
use crate::scraper::executor::{submit, Executor, TaskHandle};
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};

/// Raw `(title, url)` pair extracted from one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub title: String,
    pub url: String,
}

impl LinkCandidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// In-progress chapter and volume sequences for one novel.
#[derive(Debug, Clone, Default)]
pub struct ChapterList {
    chapters: Vec<ChapterRef>,
    volumes: Vec<VolumeRef>,
}

impl ChapterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chapter, opening a new volume on every 100th boundary.
    pub fn push(&mut self, title: &str, url: impl Into<String>) -> &ChapterRef {
        let len = self.chapters.len();
        let volume = volume_for_len(len);
        if len % CHAPTERS_PER_VOLUME == 0 {
            self.volumes.push(VolumeRef { id: volume });
        }
        self.chapters.push(ChapterRef {
            id: len as u32 + 1,
            volume,
            title: title.trim().to_string(),
            url: url.into(),
            body: None,
        });
        &self.chapters[len]
    }

    pub fn extend_links(&mut self, links: impl IntoIterator<Item = LinkCandidate>) {
        for link in links {
            self.push(&link.title, link.url);
        }
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn chapters(&self) -> &[ChapterRef] {
        &self.chapters
    }

    pub fn volumes(&self) -> &[VolumeRef] {
        &self.volumes
    }

    /// Hand the sequences over: `(volumes, chapters)`.
    pub fn into_parts(self) -> (Vec<VolumeRef>, Vec<ChapterRef>) {
        (self.volumes, self.chapters)
    }
}

/// Where a listing page number is encoded in a pagination link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker<'a> {
    /// Path segment prefix, e.g. `trang-` in `/ten-truyen/trang-12/`.
    PathPrefix(&'a str),
    /// Query parameter name, e.g. `p` in `?p=12`.
    Query(&'a str),
}

impl PageMarker<'_> {
    /// Page number encoded in `href`, if any.
    ///
    /// A path prefix is matched against whole path segments, last segment
    /// first, so a novel slug that happens to start with the prefix is skipped.
    pub fn page_in(&self, href: &str) -> Option<u32> {
        match *self {
            PageMarker::PathPrefix(prefix) => {
                let path = href.split(['?', '#']).next().unwrap_or("");
                path.rsplit('/')
                    .find_map(|segment| segment.strip_prefix(prefix)?.trim().parse().ok())
            }
            PageMarker::Query(name) => {
                let query = href.split_once('?')?.1;
                let query = query.split('#').next().unwrap_or("");
                query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))?
                    .trim()
                    .parse()
                    .ok()
            }
        }
    }
}

/// Total page count from a pagination control.
///
/// The second-to-last link is the last numbered page (the last one is "next").
/// Every matched anchor counts when picking it, with or without an href.
/// Missing control, too few links or an unparsable href all mean one page.
pub fn total_pages_from_pagination(doc: &Html, links: &Selector, marker: PageMarker<'_>) -> u32 {
    let anchors: Vec<_> = doc.select(links).collect();
    if anchors.len() < 2 {
        return 1;
    }
    let Some(last_page_url) = anchors[anchors.len() - 2].value().attr("href") else {
        return 1;
    };
    debug!(last_page_url, "pagination found");
    marker.page_in(last_page_url).unwrap_or(1).max(1)
}

/// Total page count from an element's `value` attribute (e.g. `input#total-page`).
pub fn total_pages_from_input(doc: &Html, input: &Selector) -> u32 {
    doc.select(input)
        .next()
        .and_then(|e| e.value().attr("value"))
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}

/// Where page 1 of a listing comes from.
#[derive(Debug)]
pub enum FirstPage {
    /// Page 1 body is already in hand; only pages 2.. are fetched.
    Fetched(String),
    /// Every page, including page 1, is fetched through the executor.
    Remote,
}

/// A pending listing page fetch.
struct PageFuture {
    page: u32,
    handle: TaskHandle<String>,
}

/// Fetches listing pages concurrently and merges their links in page order.
pub struct Harvester<'a, E: Executor + ?Sized> {
    executor: &'a E,
    fetcher: Arc<dyn Fetcher>,
}

impl<'a, E: Executor + ?Sized> Harvester<'a, E> {
    pub fn new(executor: &'a E, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { executor, fetcher }
    }

    /// Append the links of every listing page to `list`.
    ///
    /// All remote pages are submitted before any local work starts. `page_url`
    /// builds the URL of a page number; `extract` turns one page body into its
    /// chapter links, in listing order. A failed page stops the merge at that
    /// page: `list` keeps the pages before it and the error is returned.
    pub fn harvest<U, X>(
        &self,
        first: FirstPage,
        total_page: u32,
        page_url: U,
        mut extract: X,
        list: &mut ChapterList,
    ) -> Result<(), ScraperError>
    where
        U: Fn(u32) -> String,
        X: FnMut(u32, &str) -> Result<Vec<LinkCandidate>, ScraperError>,
    {
        let total_page = total_page.max(1);
        let (first_html, first_remote) = match first {
            FirstPage::Fetched(html) => (Some(html), 2),
            FirstPage::Remote => (None, 1),
        };
        info!(total_page, "harvesting chapter listing");

        let pending: Vec<PageFuture> = (first_remote..=total_page)
            .map(|page| {
                let url = page_url(page);
                info!(page, url = %url, "visiting");
                let fetcher = Arc::clone(&self.fetcher);
                let task = url.clone();
                PageFuture {
                    page,
                    handle: submit(self.executor, task, move || fetcher.get_text(&url)),
                }
            })
            .collect();

        if let Some(html) = first_html {
            let links = extract(1, &html)?;
            debug!(page = 1, links = links.len(), "page merged");
            list.extend_links(links);
        }

        for PageFuture { page, handle } in pending {
            let body = handle
                .wait()
                .map_err(|e| e.with_context(format!("listing page {}", page)))?;
            let links = extract(page, &body)?;
            debug!(page, links = links.len(), "page merged");
            list.extend_links(links);
        }
        Ok(())
    }
}
