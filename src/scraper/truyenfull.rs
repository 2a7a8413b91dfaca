//! TruyenFull adapter (truyenfull.io, truyenfull.tv).
//!
//! The two hosts share page markup but list chapters differently: truyenfull.tv
//! paginates the novel page itself (`/trang-N`), truyenfull.io serves every
//! listing page from a JSON endpoint whose `chap_list` field holds HTML.

use crate::model::{ChapterRef, Novel, SearchResult};
use crate::scraper::cleaner::Cleaner;
use crate::scraper::error::ScraperError;
use crate::scraper::executor::Executor;
use crate::scraper::harvest::{
    total_pages_from_input, total_pages_from_pagination, ChapterList, FirstPage, Harvester,
    LinkCandidate, PageMarker,
};
use crate::scraper::{
    absolute_url, element_text, parse_selector, select_attr, select_text, BookListSelectors,
    CrawlContext, Crawler, Site,
};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const BASE_URLS: &[&str] = &["https://truyenfull.io/", "https://truyenfull.tv/"];

const SEARCH_URL: &str = "https://truyentr.info/";
const LIST_ENDPOINT: &str = "https://truyenfull.io/ajax.php";
const TV_HOST: &str = "truyenfull.tv";

struct Selectors {
    title: Selector,
    cover: Selector,
    author: Selector,
    description: Selector,
    pagination: Selector,
    chapter_link: Selector,
    truyen_id: Selector,
    total_page: Selector,
    truyen_ascii: Selector,
    content: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ScraperError> {
        Ok(Self {
            title: parse_selector("h3.title, h1.title")?,
            cover: parse_selector(".book-thumb img, .books .book img")?,
            author: parse_selector(r#".info a[itemprop="author"]"#)?,
            description: parse_selector(
                r#"div.desc-text.desc-text-full[itemprop="description"]"#,
            )?,
            pagination: parse_selector(".pagination li a")?,
            chapter_link: parse_selector(".list-chapter a")?,
            truyen_id: parse_selector("input#truyen-id")?,
            total_page: parse_selector("input#total-page")?,
            truyen_ascii: parse_selector("input#truyen-ascii")?,
            content: parse_selector("#chapter-c, .chapter-c")?,
        })
    }
}

/// Response of the truyenfull.io chapter-list endpoint.
#[derive(Debug, Deserialize)]
struct ChapterListResponse {
    chap_list: String,
}

/// Query values shared by every truyenfull.io listing page request.
struct ListQuery {
    tid: String,
    tascii: String,
    tname: String,
    total_page: u32,
}

impl ListQuery {
    fn page_url(&self, endpoint: &Url, page: u32) -> String {
        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("type", "list_chapter")
            .append_pair("tid", &self.tid)
            .append_pair("tascii", &self.tascii)
            .append_pair("tname", &self.tname)
            .append_pair("page", &page.to_string())
            .append_pair("totalp", &self.total_page.to_string());
        url.to_string()
    }
}

/// Chapter title from a listing link.
///
/// The `title` attribute reads "<novel name> - <chapter title>"; the novel name
/// is dropped. Falls back to the link text.
fn chapter_title(a: ElementRef<'_>) -> String {
    a.value()
        .attr("title")
        .map(|t| {
            t.split('-')
                .skip(1)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" - ")
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| element_text(a))
}

fn is_tv(novel_url: &str) -> bool {
    Url::parse(novel_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == TV_HOST || h.ends_with(".truyenfull.tv")))
        .unwrap_or(false)
}

/// TruyenFull crawler.
pub struct TruyenFullCrawler {
    ctx: CrawlContext,
    sel: Selectors,
    book_list: BookListSelectors,
    cleaner: Cleaner,
}

impl TruyenFullCrawler {
    pub fn new(ctx: CrawlContext) -> Result<Self, ScraperError> {
        Ok(Self {
            ctx,
            sel: Selectors::new()?,
            book_list: BookListSelectors::new()?,
            cleaner: Cleaner::with_ads()?,
        })
    }

    /// Chapter links of one listing fragment, in document order.
    fn parse_links(&self, html: &str, base: &str) -> Vec<LinkCandidate> {
        let doc = Html::parse_fragment(html);
        doc.select(&self.sel.chapter_link)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                Some(LinkCandidate::new(chapter_title(a), absolute_url(base, href)))
            })
            .collect()
    }

    fn harvester(&self) -> Harvester<'_, dyn Executor> {
        Harvester::new(&*self.ctx.executor, Arc::clone(&self.ctx.fetcher))
    }

    /// truyenfull.tv: the novel page is listing page 1; others live at `<novel>/trang-N`.
    fn harvest_tv(
        &self,
        novel_url: &str,
        doc: &Html,
        html: String,
        list: &mut ChapterList,
    ) -> Result<(), ScraperError> {
        let total_page =
            total_pages_from_pagination(doc, &self.sel.pagination, PageMarker::PathPrefix("trang-"));
        info!("Total page count = {}", total_page);
        let base = novel_url.trim_end_matches('/').to_string();
        self.harvester().harvest(
            FirstPage::Fetched(html),
            total_page,
            |page| format!("{}/trang-{}/", base, page),
            |_, body| Ok(self.parse_links(body, novel_url)),
            list,
        )
    }

    /// truyenfull.io: every listing page comes from the JSON endpoint.
    fn harvest_io(
        &self,
        novel_url: &str,
        title: &str,
        doc: &Html,
        list: &mut ChapterList,
    ) -> Result<(), ScraperError> {
        let root = doc.root_element();
        let tid = select_attr(root, &self.sel.truyen_id, "value").ok_or_else(|| {
            ScraperError::ParseStoryPage {
                message: "No truyen novel id found (input#truyen-id)".to_string(),
            }
        })?;
        let query = ListQuery {
            tid,
            tascii: select_attr(root, &self.sel.truyen_ascii, "value").unwrap_or_default(),
            tname: title.to_string(),
            total_page: total_pages_from_input(doc, &self.sel.total_page),
        };
        info!("Total page count: {}", query.total_page);
        let endpoint = Url::parse(LIST_ENDPOINT).map_err(|e| ScraperError::InvalidUrl {
            input: LIST_ENDPOINT.to_string(),
            reason: e.to_string(),
        })?;
        self.harvester().harvest(
            FirstPage::Remote,
            query.total_page,
            |page| query.page_url(&endpoint, page),
            |page, body| {
                let response: ChapterListResponse =
                    serde_json::from_str(body).map_err(|e| ScraperError::Json {
                        url: query.page_url(&endpoint, page),
                        source: e,
                    })?;
                Ok(self.parse_links(&response.chap_list, novel_url))
            },
            list,
        )
    }
}

impl Crawler for TruyenFullCrawler {
    fn site(&self) -> Site {
        Site::TruyenFull
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
                message: "missing title (h3.title, h1.title)".to_string(),
            });
        }
        info!("Novel title: {}", title);

        let cover_url =
            select_attr(root, &self.sel.cover, "src").map(|src| absolute_url(novel_url, &src));
        info!("Novel cover: {:?}", cover_url);

        let author = root
            .select(&self.sel.author)
            .map(element_text)
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        info!("Novel author: {}", author);

        let description = Some(select_text(root, &self.sel.description)).filter(|d| !d.is_empty());

        let mut list = ChapterList::new();
        if is_tv(novel_url) {
            self.harvest_tv(novel_url, &doc, html, &mut list)?;
        } else {
            self.harvest_io(novel_url, &title, &doc, &mut list)?;
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::{CountingExecutor, FakeFetcher};

    type Fixture = (TruyenFullCrawler, Arc<FakeFetcher>, Arc<CountingExecutor>);

    fn crawler(fetcher: FakeFetcher) -> Result<Fixture, ScraperError> {
        let fetcher = Arc::new(fetcher);
        let executor = Arc::new(CountingExecutor::default());
        let ctx = CrawlContext::new(fetcher.clone(), executor.clone());
        Ok((TruyenFullCrawler::new(ctx)?, fetcher, executor))
    }

    fn listing(from: u32, to: u32) -> String {
        let items: String = (from..=to)
            .map(|n| {
                format!(
                    r#"<li><a href="https://truyenfull.tv/de-ba/chuong-{n}/" title="Đế Bá - Chương {n}: Tên {n}">Chương {n}</a></li>"#
                )
            })
            .collect();
        format!(r#"<ul class="list-chapter">{}</ul>"#, items)
    }

    fn tv_novel_page() -> String {
        format!(
            r#"<html><body>
            <div class="books"><div class="book"><img src="/cover/de-ba.jpg"></div></div>
            <h3 class="title">Đế Bá</h3>
            <div class="info">
                <a itemprop="author" href="/tac-gia/a/">Yếm Bút Tiêu Sinh</a>
                <a itemprop="author" href="/tac-gia/b/">Đồng Tác Giả</a>
            </div>
            <div class="desc-text desc-text-full" itemprop="description">  Ngàn vạn năm trước...  </div>
            {}
            <ul class="pagination">
                <li><a href="https://truyenfull.tv/de-ba/trang-2/">2</a></li>
                <li><a href="https://truyenfull.tv/de-ba/trang-3/">Cuối</a></li>
                <li><a href="https://truyenfull.tv/de-ba/trang-2/">»</a></li>
            </ul>
            </body></html>"#,
            listing(1, 50)
        )
    }

    #[test]
    fn chapter_title_drops_novel_name() -> Result<(), ScraperError> {
        let doc = Html::parse_fragment(
            r#"<a title="Đế Bá - Chương 7 - Phần 2" href="x">Chương 7</a><a href="y">  Chương 8  </a><a title="NoDash" href="z">Chương 9</a>"#,
        );
        let sel = parse_selector("a")?;
        let titles: Vec<String> = doc.select(&sel).map(chapter_title).collect();
        assert_eq!(titles, vec!["Chương 7 - Phần 2", "Chương 8", "Chương 9"]);
        Ok(())
    }

    #[test]
    fn tv_reads_metadata_and_merges_paginated_listing() -> Result<(), ScraperError> {
        let (crawler, fetcher, executor) = crawler(
            FakeFetcher::default()
                .route("https://truyenfull.tv/de-ba", tv_novel_page())
                .route("https://truyenfull.tv/de-ba/trang-2/", listing(51, 100))
                .route("https://truyenfull.tv/de-ba/trang-3/", listing(101, 120)),
        )?;
        let novel = crawler.read_novel_info("https://truyenfull.tv/de-ba")?;
        assert_eq!(novel.title, "Đế Bá");
        assert_eq!(novel.author, "Yếm Bút Tiêu Sinh, Đồng Tác Giả");
        assert_eq!(novel.cover_url.as_deref(), Some("https://truyenfull.tv/cover/de-ba.jpg"));
        assert_eq!(novel.description.as_deref(), Some("Ngàn vạn năm trước..."));
        assert_eq!(executor.submitted(), 2);
        assert_eq!(novel.chapters.len(), 120);
        assert_eq!(novel.chapters[0].title, "Chương 1: Tên 1");
        assert_eq!(novel.chapters[100].id, 101);
        assert_eq!(novel.chapters[100].volume, 2);
        assert_eq!(novel.chapters[100].url, "https://truyenfull.tv/de-ba/chuong-101/");
        assert_eq!(novel.volumes.len(), 2);
        assert!(fetcher
            .completed()
            .contains(&"https://truyenfull.tv/de-ba/trang-3/".to_string()));
        Ok(())
    }

    #[test]
    fn tv_slug_starting_with_trang_still_paginates() -> Result<(), ScraperError> {
        let novel_url = "https://truyenfull.tv/trang-tu-ky/";
        let page = format!(
            r#"<h3 class="title">Tráng Tử Ký</h3>{}
            <ul class="pagination">
                <li><a href="https://truyenfull.tv/trang-tu-ky/trang-2/">2</a></li>
                <li><a href="https://truyenfull.tv/trang-tu-ky/trang-3/">Cuối</a></li>
                <li><a href="https://truyenfull.tv/trang-tu-ky/trang-2/">»</a></li>
            </ul>"#,
            listing(1, 2)
        );
        let (crawler, _, executor) = crawler(
            FakeFetcher::default()
                .route(novel_url, page)
                .route("https://truyenfull.tv/trang-tu-ky/trang-2/", listing(3, 4))
                .route("https://truyenfull.tv/trang-tu-ky/trang-3/", listing(5, 6)),
        )?;
        let novel = crawler.read_novel_info(novel_url)?;
        assert_eq!(executor.submitted(), 2);
        let ids: Vec<u32> = novel.chapters.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(novel.chapters[5].title, "Chương 6: Tên 6");
        Ok(())
    }

    #[test]
    fn tv_without_pagination_is_single_page() -> Result<(), ScraperError> {
        let page = r#"<h1 class="title">Ngắn</h1><ul class="list-chapter">
            <li><a href="/ngan/chuong-1/" title="Ngắn - Chương 1">c1</a></li></ul>"#;
        let (crawler, _, executor) =
            crawler(FakeFetcher::default().route("https://truyenfull.tv/ngan/", page))?;
        let novel = crawler.read_novel_info("https://truyenfull.tv/ngan/")?;
        assert_eq!(executor.submitted(), 0);
        assert_eq!(novel.chapters.len(), 1);
        assert_eq!(novel.chapters[0].url, "https://truyenfull.tv/ngan/chuong-1/");
        assert_eq!(novel.author, "");
        assert!(novel.description.is_none());
        Ok(())
    }

    #[test]
    fn io_fetches_every_listing_page_from_endpoint() -> Result<(), ScraperError> {
        let page = r#"<h3 class="title">Đế Bá</h3>
            <input id="truyen-id" type="hidden" value="123">
            <input id="truyen-ascii" type="hidden" value="de-ba">
            <input id="total-page" type="hidden" value="2">"#;
        let json = |from, to| serde_json::json!({ "chap_list": listing(from, to) }).to_string();
        let (crawler, fetcher, executor) = crawler(
            FakeFetcher::default()
                .route("https://truyenfull.io/de-ba/", page)
                .route("page=1&totalp=2", json(1, 50))
                .route("page=2&totalp=2", json(51, 60)),
        )?;
        let novel = crawler.read_novel_info("https://truyenfull.io/de-ba/")?;
        assert_eq!(executor.submitted(), 2);
        assert_eq!(novel.chapters.len(), 60);
        assert_eq!(novel.chapters[50].title, "Chương 51: Tên 51");
        let requests = fetcher.completed();
        assert!(requests
            .iter()
            .any(|u| u.starts_with("https://truyenfull.io/ajax.php?type=list_chapter&tid=123&tascii=de-ba&tname=")));
        Ok(())
    }

    #[test]
    fn io_without_novel_id_is_a_parse_error() -> Result<(), ScraperError> {
        let (crawler, _, _) = crawler(
            FakeFetcher::default().route("https://truyenfull.io/x/", r#"<h3 class="title">X</h3>"#),
        )?;
        match crawler.read_novel_info("https://truyenfull.io/x/") {
            Err(ScraperError::ParseStoryPage { message }) => assert!(message.contains("truyen-id")),
            other => panic!("expected ParseStoryPage, got {:?}", other.map(|n| n.title)),
        }
        Ok(())
    }

    #[test]
    fn io_invalid_json_is_reported() -> Result<(), ScraperError> {
        let page = r#"<h3 class="title">X</h3><input id="truyen-id" value="9">"#;
        let (crawler, _, _) = crawler(
            FakeFetcher::default()
                .route("https://truyenfull.io/x/", page)
                .route("page=1&totalp=1", "<html>not json</html>"),
        )?;
        assert!(matches!(
            crawler.read_novel_info("https://truyenfull.io/x/"),
            Err(ScraperError::Json { .. })
        ));
        Ok(())
    }

    #[test]
    fn missing_title_is_a_parse_error() -> Result<(), ScraperError> {
        let (crawler, _, _) =
            crawler(FakeFetcher::default().route("https://truyenfull.tv/x", "<p>gone</p>"))?;
        assert!(matches!(
            crawler.read_novel_info("https://truyenfull.tv/x"),
            Err(ScraperError::ParseStoryPage { .. })
        ));
        Ok(())
    }

    #[test]
    fn chapter_body_is_cleaned() -> Result<(), ScraperError> {
        let page = r#"<div id="chapter-c">Dòng một.<br><div class="ads-responsive">QC</div>Dòng hai.</div>"#;
        let (crawler, _, _) =
            crawler(FakeFetcher::default().route("https://truyenfull.io/x/chuong-1/", page))?;
        let chapter = ChapterRef {
            id: 1,
            volume: 1,
            title: "Chương 1".to_string(),
            url: "https://truyenfull.io/x/chuong-1/".to_string(),
            body: None,
        };
        assert_eq!(
            crawler.download_chapter_body(&chapter)?,
            "<p>Dòng một.</p><p>Dòng hai.</p>"
        );
        Ok(())
    }

    #[test]
    fn chapter_without_container_errors() -> Result<(), ScraperError> {
        let (crawler, _, _) =
            crawler(FakeFetcher::default().route("https://truyenfull.io/x/chuong-2/", "<p>?</p>"))?;
        let chapter = ChapterRef {
            id: 2,
            volume: 1,
            title: "Chương 2".to_string(),
            url: "https://truyenfull.io/x/chuong-2/".to_string(),
            body: None,
        };
        assert!(matches!(
            crawler.download_chapter_body(&chapter),
            Err(ScraperError::ParseChapter { id: 2, .. })
        ));
        Ok(())
    }

    #[test]
    fn search_uses_search_host() -> Result<(), ScraperError> {
        let page = r#"<div class="cate-list-books"><div class="list-item">
            <h3 class="truyen-title"><a href="https://truyenfull.io/de-ba/">Đế Bá</a></h3>
            <span class="author">Yếm Bút Tiêu Sinh</span></div></div>"#;
        let (crawler, fetcher, _) =
            crawler(FakeFetcher::default().route("https://truyentr.info/?s=", page))?;
        let results = crawler.search_novel("đế bá")?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://truyenfull.io/de-ba/");
        assert_eq!(results[0].info, "Yếm Bút Tiêu Sinh");
        assert!(fetcher.completed()[0].starts_with("https://truyentr.info/?s=%C4%91"));
        Ok(())
    }
}
