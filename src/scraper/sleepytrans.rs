//! Sleepy Translations adapter (sleepytranslations.com, a Madara WordPress theme).
//!
//! The chapter list is a single AJAX response, newest chapter first.

use crate::model::{ChapterRef, Novel};
use crate::scraper::cleaner::Cleaner;
use crate::scraper::error::ScraperError;
use crate::scraper::harvest::{ChapterList, LinkCandidate};
use crate::scraper::{
    absolute_url, element_text, parse_selector, select_attr, CrawlContext, Crawler, Site,
};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

pub const BASE_URLS: &[&str] = &["https://sleepytranslations.com/"];

struct Selectors {
    title: Selector,
    cover: Selector,
    author: Selector,
    chapters_holder: Selector,
    chapter_link: Selector,
    paragraph: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ScraperError> {
        Ok(Self {
            title: parse_selector(".post-title h1")?,
            cover: parse_selector(".summary_image a img")?,
            author: parse_selector(r#".author-content a[href*="author"]"#)?,
            chapters_holder: parse_selector("#manga-chapters-holder")?,
            chapter_link: parse_selector(".wp-manga-chapter a")?,
            paragraph: parse_selector(".reading-content p")?,
        })
    }
}

/// Text of `el` without the text of any nested `skip` elements (e.g. "HOT" badges in titles).
fn text_without(el: ElementRef<'_>, skip: &str) -> String {
    fn collect(el: ElementRef<'_>, skip: &str, out: &mut String) {
        for child in el.children() {
            if let Some(text) = child.value().as_text() {
                out.push_str(text);
            } else if let Some(child_el) = ElementRef::wrap(child) {
                if child_el.value().name() != skip {
                    collect(child_el, skip, out);
                }
            }
        }
    }
    let mut out = String::new();
    collect(el, skip, &mut out);
    out.trim().to_string()
}

/// Sleepy Translations crawler.
pub struct SleepyTranslationsCrawler {
    ctx: CrawlContext,
    sel: Selectors,
    cleaner: Cleaner,
}

impl SleepyTranslationsCrawler {
    pub fn new(ctx: CrawlContext) -> Result<Self, ScraperError> {
        Ok(Self {
            ctx,
            sel: Selectors::new()?,
            cleaner: Cleaner::new(&[])?,
        })
    }

    /// Chapter links in reading order (the site lists newest first).
    fn parse_links(&self, html: &str, base: &str) -> Vec<LinkCandidate> {
        let doc = Html::parse_document(html);
        let mut links: Vec<LinkCandidate> = doc
            .select(&self.sel.chapter_link)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                Some(LinkCandidate::new(element_text(a), absolute_url(base, href)))
            })
            .collect();
        links.reverse();
        links
    }
}

impl Crawler for SleepyTranslationsCrawler {
    fn site(&self) -> Site {
        Site::SleepyTranslations
    }

    fn read_novel_info(&self, novel_url: &str) -> Result<Novel, ScraperError> {
        debug!("Visiting {}", novel_url);
        let html = self.ctx.fetcher.get_text(novel_url)?;
        let doc = Html::parse_document(&html);
        let root = doc.root_element();

        let title = root
            .select(&self.sel.title)
            .next()
            .map(|h1| text_without(h1, "span"))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ScraperError::ParseStoryPage {
                message: "missing title (.post-title h1)".to_string(),
            })?;
        info!("Novel title: {}", title);

        let cover_url =
            select_attr(root, &self.sel.cover, "src").map(|src| absolute_url(novel_url, &src));
        info!("Novel cover: {:?}", cover_url);

        let author = root
            .select(&self.sel.author)
            .map(element_text)
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        info!("Novel author: {}", author);

        if let Some(id) = select_attr(root, &self.sel.chapters_holder, "data-id") {
            info!("Novel id: {}", id);
        }

        let ajax_url = format!("{}/ajax/chapters", novel_url.trim_end_matches('/'));
        debug!("Visiting {}", ajax_url);
        let listing = self.ctx.fetcher.post_form(&ajax_url, &[])?;

        let mut list = ChapterList::new();
        list.extend_links(self.parse_links(&listing, novel_url));
        if list.is_empty() {
            return Err(ScraperError::EmptyChapterList);
        }
        info!("Found {} chapters in {} volumes", list.len(), list.volumes().len());

        let (volumes, chapters) = list.into_parts();
        Ok(Novel {
            url: novel_url.to_string(),
            title,
            author,
            description: None,
            cover_url,
            volumes,
            chapters,
        })
    }

    fn download_chapter_body(&self, chapter: &ChapterRef) -> Result<String, ScraperError> {
        debug!("Visiting {}", chapter.url);
        let html = self.ctx.fetcher.get_text(&chapter.url)?;
        let doc = Html::parse_document(&html);
        let body = self.cleaner.extract_paragraphs(doc.select(&self.sel.paragraph));
        if body.is_empty() {
            return Err(ScraperError::ParseChapter {
                id: chapter.id,
                url: chapter.url.clone(),
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::testing::{CountingExecutor, FakeFetcher};
    use std::sync::Arc;

    const NOVEL: &str = "https://sleepytranslations.com/series/the-sleepy-one/";
    const AJAX: &str = "https://sleepytranslations.com/series/the-sleepy-one/ajax/chapters";

    const NOVEL_PAGE: &str = r##"<div class="post-title"><h1><span class="manga-title-badges hot">HOT</span> The Sleepy One </h1></div>
        <div class="summary_image"><a href="#"><img src="/wp-content/uploads/cover.jpg"></a></div>
        <div class="author-content"><a href="https://sleepytranslations.com/novel-author/a/">Author A</a>
            <a href="https://sleepytranslations.com/novel-author/b/">Author B</a>
            <a href="https://sleepytranslations.com/genre/x/">Not an author</a></div>
        <div id="manga-chapters-holder" data-id="4242"></div>"##;

    fn chapters_fragment(count: u32) -> String {
        let items: String = (1..=count)
            .rev()
            .map(|n| {
                format!(
                    r#"<li class="wp-manga-chapter"><a href="{NOVEL}chapter-{n}/"> Chapter {n} </a></li>"#
                )
            })
            .collect();
        format!("<ul>{}</ul>", items)
    }

    type Fixture = (SleepyTranslationsCrawler, Arc<FakeFetcher>, Arc<CountingExecutor>);

    fn crawler(fetcher: FakeFetcher) -> Result<Fixture, ScraperError> {
        let fetcher = Arc::new(fetcher);
        let executor = Arc::new(CountingExecutor::default());
        let ctx = CrawlContext::new(fetcher.clone(), executor.clone());
        Ok((SleepyTranslationsCrawler::new(ctx)?, fetcher, executor))
    }

    #[test]
    fn reads_metadata_and_reverses_chapter_list() -> Result<(), ScraperError> {
        let (crawler, fetcher, executor) = crawler(
            FakeFetcher::default()
                .route(NOVEL, NOVEL_PAGE)
                .route(AJAX, chapters_fragment(102)),
        )?;
        let novel = crawler.read_novel_info(NOVEL)?;
        assert_eq!(novel.title, "The Sleepy One");
        assert_eq!(novel.author, "Author A Author B");
        assert_eq!(
            novel.cover_url.as_deref(),
            Some("https://sleepytranslations.com/wp-content/uploads/cover.jpg")
        );
        assert_eq!(novel.chapters.len(), 102);
        assert_eq!(novel.chapters[0].title, "Chapter 1");
        assert_eq!(novel.chapters[0].id, 1);
        assert_eq!(novel.chapters[101].title, "Chapter 102");
        assert_eq!(novel.chapters[101].volume, 2);
        assert_eq!(novel.volumes.len(), 2);
        assert_eq!(executor.submitted(), 0);
        let forms = fetcher.forms();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0].0, AJAX);
        assert!(forms[0].1.is_empty());
        Ok(())
    }

    #[test]
    fn empty_chapter_list_is_an_error() -> Result<(), ScraperError> {
        let (crawler, _, _) = crawler(
            FakeFetcher::default()
                .route(NOVEL, NOVEL_PAGE)
                .route(AJAX, "<ul></ul>"),
        )?;
        assert!(matches!(
            crawler.read_novel_info(NOVEL),
            Err(ScraperError::EmptyChapterList)
        ));
        Ok(())
    }

    #[test]
    fn title_ignores_nested_spans() -> Result<(), ScraperError> {
        let doc = Html::parse_fragment(r#"<h1>A <span>NEW</span>Title<b> Here</b></h1>"#);
        let sel = parse_selector("h1")?;
        let h1 = doc.select(&sel).next().ok_or(ScraperError::EmptyChapterList)?;
        assert_eq!(text_without(h1, "span"), "A Title Here");
        Ok(())
    }

    #[test]
    fn chapter_body_from_reading_content_paragraphs() -> Result<(), ScraperError> {
        let url = format!("{}chapter-1/", NOVEL);
        let (crawler, _, _) = crawler(FakeFetcher::default().route(
            &url,
            r#"<div class="reading-content"><p>First line.</p><p>&nbsp;</p><p>Second <em>line</em>.</p></div>"#,
        ))?;
        let chapter = ChapterRef {
            id: 1,
            volume: 1,
            title: "Chapter 1".to_string(),
            url,
            body: None,
        };
        assert_eq!(
            crawler.download_chapter_body(&chapter)?,
            "<p>First line.</p><p>Second line.</p>"
        );
        Ok(())
    }

    #[test]
    fn chapter_without_paragraphs_errors() -> Result<(), ScraperError> {
        let url = format!("{}chapter-9/", NOVEL);
        let (crawler, _, _) = crawler(FakeFetcher::default().route(&url, "<div>locked</div>"))?;
        let chapter = ChapterRef {
            id: 9,
            volume: 1,
            title: "Chapter 9".to_string(),
            url,
            body: None,
        };
        assert!(matches!(
            crawler.download_chapter_body(&chapter),
            Err(ScraperError::ParseChapter { id: 9, .. })
        ));
        Ok(())
    }

    #[test]
    fn search_is_unsupported() -> Result<(), ScraperError> {
        let (crawler, _, _) = crawler(FakeFetcher::default())?;
        assert!(matches!(
            crawler.search_novel("sleepy"),
            Err(ScraperError::SearchUnsupported { .. })
        ));
        Ok(())
    }
}
