//! Canonical data model for a scraped novel.
//!
//! Every site adapter produces a [Novel]; the CLI serializes it to JSON.

use serde::{Deserialize, Serialize};

/// Number of chapters grouped into one volume.
pub const CHAPTERS_PER_VOLUME: usize = 100;

/// One novel: metadata plus its volume and chapter sequences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Novel {
    pub url: String,
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "coverUrl", skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    pub volumes: Vec<VolumeRef>,
    pub chapters: Vec<ChapterRef>,
}

/// One chapter in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    /// 1-based, contiguous within a novel.
    pub id: u32,
    /// 1-based volume this chapter belongs to.
    pub volume: u32,
    pub title: String,
    /// Absolute URL of the chapter page.
    pub url: String,
    /// Minimal HTML (`<p>...</p>` only). Absent until downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    pub id: u32,
}

/// One hit from a site search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Latest chapter, author and status joined with `" | "`.
    pub info: String,
}

/// Volume id for the chapter appended after `len` existing chapters.
pub fn volume_for_len(len: usize) -> u32 {
    (1 + len / CHAPTERS_PER_VOLUME) as u32
}
