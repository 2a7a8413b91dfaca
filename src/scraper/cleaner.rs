//! Chapter body cleaning: drop ads and junk, keep paragraphs as minimal HTML.

use crate::scraper::error::ScraperError;
use crate::scraper::parse_selector;
use scraper::{ElementRef, Selector};

/// Ad containers injected into chapter bodies by the Vietnamese reading sites.
pub const AD_CSS: &[&str] = &[
    ".ads-content",
    ".ads-inpage-container",
    ".ads-responsive",
    ".ads-pc",
    ".ads-chapter-box",
    ".incontent-ad",
    ".ads-network",
    ".ads-desktop",
    ".ads-mobile",
    ".ads-holder",
    ".ads-taboola",
    ".ads-middle",
    ".adsbygoogle",
];

const SKIP_TAGS: &[&str] = &["script", "style", "iframe", "ins", "noscript", "button"];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "blockquote", "li", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Extracts readable paragraphs from a content container.
#[derive(Debug)]
pub struct Cleaner {
    bad: Vec<Selector>,
}

impl Cleaner {
    /// Cleaner that also drops every element matching one of `bad_css`.
    pub fn new(bad_css: &[&str]) -> Result<Self, ScraperError> {
        let bad = bad_css
            .iter()
            .map(|css| parse_selector(css))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { bad })
    }

    /// Cleaner with the [AD_CSS] list.
    pub fn with_ads() -> Result<Self, ScraperError> {
        Self::new(AD_CSS)
    }

    /// Paragraphs of `container` as `<p>...</p>` HTML.
    ///
    /// Block elements and `<br>` end a paragraph; whitespace is collapsed and
    /// empty paragraphs are dropped.
    pub fn extract_contents(&self, container: ElementRef<'_>) -> String {
        self.extract_paragraphs(std::iter::once(container))
    }

    /// Like [Cleaner::extract_contents], over several sibling containers in order.
    pub fn extract_paragraphs<'a>(&self, containers: impl IntoIterator<Item = ElementRef<'a>>) -> String {
        let mut out = Vec::new();
        let mut para = String::new();
        for container in containers {
            if self.is_junk(&container) {
                continue;
            }
            self.walk(container, &mut para, &mut out);
            flush(&mut para, &mut out);
        }
        out.iter().map(|p| format!("<p>{}</p>", p)).collect()
    }

    fn is_junk(&self, el: &ElementRef<'_>) -> bool {
        SKIP_TAGS.contains(&el.value().name()) || self.bad.iter().any(|s| s.matches(el))
    }

    fn walk(&self, el: ElementRef<'_>, para: &mut String, out: &mut Vec<String>) {
        for child in el.children() {
            if let Some(text) = child.value().as_text() {
                para.push_str(text);
                continue;
            }
            let Some(child_el) = ElementRef::wrap(child) else {
                continue;
            };
            if self.is_junk(&child_el) {
                continue;
            }
            let name = child_el.value().name();
            if name == "br" {
                flush(para, out);
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                flush(para, out);
            }
            self.walk(child_el, para, out);
            if block {
                flush(para, out);
            }
        }
    }
}

fn flush(para: &mut String, out: &mut Vec<String>) {
    let text = para.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        out.push(html_escape_inner(&text));
    }
    para.clear();
}

fn html_escape_inner(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
