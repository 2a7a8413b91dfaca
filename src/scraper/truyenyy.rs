//! TruyenYY adapter (truyenyy.vip).
//!
//! Metadata comes from the novel page; the chapter list lives on a separate
//! `danh-sach-chuong/` listing paginated with `?p=N`.

use crate::model::{ChapterRef, Novel, SearchResult};
use crate::scraper::cleaner::Cleaner;
use crate::scraper::error::ScraperError;
use crate::scraper::harvest::{
    total_pages_from_pagination, ChapterList, FirstPage, Harvester, LinkCandidate, PageMarker,
};
use crate::scraper::{
    absolute_url, element_text, parse_selector, select_attr, select_text, BookListSelectors,
    CrawlContext, Crawler, Site,
};
use reqwest::Url;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};

pub const BASE_URLS: &[&str] = &["https://truyenyy.vip/"];

const SEARCH_URL: &str = "https://truyenyy.vip/";
const LISTING_PATH: &str = "danh-sach-chuong/";

struct Selectors {
    title: Selector,
    cover: Selector,
    author: Selector,
    description: Selector,
    pagination: Selector,
    cell: Selector,
    link: Selector,
    content: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ScraperError> {
        Ok(Self {
            title: parse_selector("h1.name")?,
            cover: parse_selector(".cover img")?,
            author: parse_selector(".author a")?,
            description: parse_selector("section#id_novel_summary p")?,
            pagination: parse_selector(".pagination li a")?,
            cell: parse_selector("tbody tr td")?,
            link: parse_selector("a")?,
            content: parse_selector(".chap-content")?,
        })
    }
}

/// TruyenYY crawler.
pub struct TruyenYYCrawler {
    ctx: CrawlContext,
    sel: Selectors,
    book_list: BookListSelectors,
    cleaner: Cleaner,
}

impl TruyenYYCrawler {
    pub fn new(ctx: CrawlContext) -> Result<Self, ScraperError> {
        Ok(Self {
            ctx,
            sel: Selectors::new()?,
            book_list: BookListSelectors::new()?,
            cleaner: Cleaner::with_ads()?,
        })
    }

    /// Chapter links of one listing page.
    ///
    /// Rows are `number | link | date`; only the middle cell of every three holds the chapter.
    fn parse_links(&self, html: &str, base: &str) -> Vec<LinkCandidate> {
        let doc = Html::parse_document(html);
        doc.select(&self.sel.cell)
            .enumerate()
            .filter(|(i, _)| i % 3 == 1)
            .filter_map(|(_, td)| {
                let a = td.select(&self.sel.link).next()?;
                let href = a.value().attr("href")?;
                Some(LinkCandidate::new(element_text(a), absolute_url(base, href)))
            })
            .collect()
    }
}

impl Crawler for TruyenYYCrawler {
    fn site(&self) -> Site {
        Site::TruyenYY
    }

    fn search_novel(&self, query: &str) -> Result<Vec<SearchResult>, ScraperError> {
        let url = Url::parse_with_params(SEARCH_URL, &[("s", query)]).map_err(|e| {
            ScraperError::InvalidUrl {
                input: query.to_string(),
                reason: e.to_string(),
            }
        })?;
        debug!("Searching {}", url);
        let html = self.ctx.fetcher.get_text(url.as_str())?;
        Ok(self.book_list.parse(&html, SEARCH_URL))
    }

    fn read_novel_info(&self, novel_url: &str) -> Result<Novel, ScraperError> {
        debug!("Visiting {}", novel_url);
        let html = self.ctx.fetcher.get_text(novel_url)?;
        let doc = Html::parse_document(&html);
        let root = doc.root_element();

        let title = select_text(root, &self.sel.title);
        if title.is_empty() {
            return Err(ScraperError::ParseStoryPage {
                message: "missing title (h1.name)".to_string(),
            });
        }
        info!("Novel title: {}", title);

        let cover_url = select_attr(root, &self.sel.cover, "data-src")
            .or_else(|| select_attr(root, &self.sel.cover, "src"))
            .map(|src| absolute_url(novel_url, &src));
        info!("Novel cover: {:?}", cover_url);

        let author = root
            .select(&self.sel.author)
            .map(element_text)
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        info!("Novel author: {}", author);

        let description = root
            .select(&self.sel.description)
            .map(element_text)
            .collect::<Vec<_>>()
            .join(" ");
        let description = Some(description.trim().to_string()).filter(|d| !d.is_empty());

        let listing_url = format!("{}/{}", novel_url.trim_end_matches('/'), LISTING_PATH);
        debug!("Visiting {}", listing_url);
        let listing_html = self.ctx.fetcher.get_text(&listing_url)?;
        let total_page = {
            let listing = Html::parse_document(&listing_html);
            total_pages_from_pagination(&listing, &self.sel.pagination, PageMarker::Query("p"))
        };
        info!("Total page count = {}", total_page);

        let mut list = ChapterList::new();
        Harvester::new(&*self.ctx.executor, Arc::clone(&self.ctx.fetcher)).harvest(
            FirstPage::Fetched(listing_html),
            total_page,
            |page| format!("{}?p={}", listing_url, page),
            |_, body| Ok(self.parse_links(body, &listing_url)),
            &mut list,
        )?;
        if list.is_empty() {
            return Err(ScraperError::EmptyChapterList);
        }
        info!("Found {} chapters in {} volumes", list.len(), list.volumes().len());

        let (volumes, chapters) = list.into_parts();
        Ok(Novel {
            url: novel_url.to_string(),
            title,
            author,
            description,
            cover_url,
            volumes,
            chapters,
        })
    }

    fn download_chapter_body(&self, chapter: &ChapterRef) -> Result<String, ScraperError> {
        let html = self.ctx.fetcher.get_text(&chapter.url)?;
        let doc = Html::parse_document(&html);
        let content = doc
            .select(&self.sel.content)
            .next()
            .ok_or_else(|| ScraperError::ParseChapter {
                id: chapter.id,
                url: chapter.url.clone(),
            })?;
        Ok(self.cleaner.extract_contents(content))
    }
}
