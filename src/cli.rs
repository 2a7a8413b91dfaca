//! CLI parsing and orchestration. Parses args, reads the novel, downloads bodies, writes JSON. Maps errors to exit codes.

use crate::config::{self, Overrides, Settings};
use crate::model::{ChapterRef, Novel};
use crate::scraper::executor::{submit, Executor, TaskHandle, ThreadPool};
use crate::scraper::{
    crawler_for, resolve_site, CrawlContext, Crawler, HttpClient, ScraperError, Site,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Scraper(#[from] ScraperError),

    #[error("Cannot write output {}: {}", .path.display(), .source)]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Scraper(_) => 2,
            CliRunError::Output { .. } | CliRunError::Json(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "novelscrape")]
#[command(about = "Scrape a web novel's chapter list (and optionally chapter text) to JSON")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, timeout_secs, workers) are read from ./novelscrape.toml or <config dir>/novelscrape/config.toml. CLI flags override config."
)]
pub struct Args {
    /// Novel URL (truyenfull.io / truyenfull.tv, truyenyy.vip, sleepytranslations.com).
    #[arg(required_unless_present = "search")]
    pub url: Option<String>,

    /// Search the site given by --site instead of scraping a URL.
    #[arg(long, conflicts_with = "url", requires = "site")]
    pub search: Option<String>,

    /// Output path. Default: {output_dir}/{sanitized-title}.json
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override site detection (truyenfull, truyenyy, or sleepytrans).
    #[arg(long, value_parser = parse_site)]
    pub site: Option<Site>,

    /// Write the chapter list only; skip downloading chapter bodies.
    #[arg(long)]
    pub toc_only: bool,

    /// Keep only chapters in this range (1-based inclusive), e.g. 1-10 or 5-20.
    #[arg(long, value_parser = parse_chapter_range)]
    pub chapters: Option<(u32, u32)>,

    /// Worker threads for page and chapter fetches (overrides config; default 4).
    #[arg(long)]
    pub workers: Option<usize>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and verbose error chain.
    #[arg(long)]
    pub verbose: bool,
}

fn parse_chapter_range(s: &str) -> Result<(u32, u32), String> {
    let s = s.trim();
    let (from_str, to_str) = s.split_once('-').ok_or_else(|| {
        format!(
            "Invalid --chapters: expected 'from-to' (e.g. 1-10), got '{}'",
            s
        )
    })?;
    let from_str = from_str.trim();
    let to_str = to_str.trim();
    let from: u32 = from_str.parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid start chapter number",
            from_str
        )
    })?;
    let to: u32 = to_str.parse().map_err(|_| {
        format!(
            "Invalid --chapters: '{}' is not a valid end chapter number",
            to_str
        )
    })?;
    if from > to {
        return Err(format!(
            "Invalid --chapters: start ({}) must be <= end ({})",
            from, to
        ));
    }
    Ok((from, to))
}

fn parse_site(s: &str) -> Result<Site, String> {
    match s.to_lowercase().as_str() {
        "truyenfull" | "tf" => Ok(Site::TruyenFull),
        "truyenyy" | "yy" => Ok(Site::TruyenYY),
        "sleepytrans" | "sleepytranslations" => Ok(Site::SleepyTranslations),
        _ => Err(format!(
            "Invalid --site value: '{}'. Use 'truyenfull', 'truyenyy', or 'sleepytrans'.",
            s
        )),
    }
}

/// Sanitize novel title to a safe filename: lowercase, replace spaces/special with `-`.
fn sanitize_title(title: &str) -> String {
    let mut s = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                '-'
            }
        })
        .collect::<String>();
    while s.contains("--") {
        s = s.replace("--", "-");
    }
    s = s.trim_matches('-').to_string();
    if s.is_empty() {
        s = "novel".to_string();
    }
    s
}

/// Ensure output path parent exists.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Keep only chapters with ids in `from..=to`, and the volumes they still reference.
fn select_chapters(novel: &mut Novel, (from, to): (u32, u32)) {
    novel.chapters.retain(|c| (from..=to).contains(&c.id));
    let chapters = &novel.chapters;
    novel
        .volumes
        .retain(|v| chapters.iter().any(|c| c.volume == v.id));
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
    {
        bar.set_style(
            style
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
    }
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Download every chapter body on `executor`, storing results in listing order.
///
/// The first failed chapter aborts the download.
fn download_bodies(
    crawler: &Arc<dyn Crawler>,
    executor: &dyn Executor,
    chapters: &mut [ChapterRef],
    progress: Option<&ProgressBar>,
) -> Result<(), ScraperError> {
    let handles: Vec<TaskHandle<String>> = chapters
        .iter()
        .map(|chapter| {
            let crawler = Arc::clone(crawler);
            let chapter = chapter.clone();
            submit(executor, format!("chapter {}", chapter.id), move || {
                crawler.download_chapter_body(&chapter)
            })
        })
        .collect();
    let total = chapters.len();
    for (chapter, handle) in chapters.iter_mut().zip(handles) {
        debug!("Waiting on {}", handle.task());
        chapter.body = Some(handle.wait()?);
        if let Some(pb) = progress {
            pb.inc(1);
            pb.set_message(format!("Fetching chapter {}/{}", chapter.id, total));
        }
    }
    Ok(())
}

fn write_json(novel: &Novel, path: &Path) -> Result<(), CliRunError> {
    let f = std::fs::File::create(path).map_err(|e| CliRunError::Output {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(f), novel)?;
    Ok(())
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let file = config::load_config().map_err(CliRunError::InvalidInput)?;
    let flags = Overrides {
        user_agent: args.user_agent.clone(),
        timeout_secs: args.timeout,
        workers: args.workers,
    };
    let settings = Settings::resolve(flags, file.as_ref()).map_err(CliRunError::InvalidInput)?;
    debug!("Settings: {:?}", settings);

    let mut builder = HttpClient::builder().timeout_secs(settings.timeout_secs);
    if let Some(ua) = settings.user_agent.clone() {
        builder = builder.user_agent(ua);
    }
    let client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;
    let pool = ThreadPool::new(settings.workers)
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to start worker threads: {}", e)))?;
    let executor: Arc<dyn Executor> = Arc::new(pool);
    let ctx = CrawlContext::new(Arc::new(client), Arc::clone(&executor));

    if let Some(query) = &args.search {
        let site = args.site.ok_or_else(|| {
            CliRunError::InvalidInput("--search requires --site".to_string())
        })?;
        let crawler = crawler_for(site, ctx)?;
        let results = crawler.search_novel(query)?;
        if results.is_empty() && !args.quiet {
            eprintln!("No results for {:?} on {}", query, site);
        }
        for r in results {
            println!("{}\n  {}", r.title, r.url);
            if !r.info.is_empty() {
                println!("  {}", r.info);
            }
        }
        return Ok(());
    }

    let url = args
        .url
        .as_deref()
        .ok_or_else(|| CliRunError::InvalidInput("Expected a novel URL or --search".to_string()))?;
    let site = resolve_site(url, args.site).map_err(|e| match &e {
        ScraperError::InvalidUrl { input, reason } => CliRunError::InvalidInput(format!(
            "Expected a novel URL. Example: https://truyenfull.io/de-ba/ Invalid: {}: {}",
            input, reason
        )),
        ScraperError::UnrecognizedHost { host } => CliRunError::InvalidInput(format!(
            "Unsupported site: {}. Use --site truyenfull, truyenyy, or sleepytrans to override.",
            host
        )),
        _ => CliRunError::Scraper(e),
    })?;
    info!("Using {} adapter with {} workers", site, settings.workers);

    let crawler = crawler_for(site, ctx)?;
    let mut novel = crawler.read_novel_info(url)?;
    if let Some(range) = args.chapters {
        select_chapters(&mut novel, range);
    }

    let output_path = match &args.output {
        Some(p) => p.clone(),
        None => settings
            .output_dir
            .join(format!("{}.json", sanitize_title(&novel.title))),
    };
    validate_output_path(&output_path)?;

    if !args.toc_only {
        let pb = (!args.quiet).then(|| progress_bar(novel.chapters.len() as u64));
        let result = download_bodies(&crawler, &*executor, &mut novel.chapters, pb.as_ref());
        if let Some(pb) = pb {
            pb.disable_steady_tick();
            pb.finish_and_clear();
        }
        result?;
    }

    write_json(&novel, &output_path)?;
    if !args.quiet {
        eprintln!(
            "Wrote {} ({} chapters)",
            output_path.display(),
            novel.chapters.len()
        );
    }
    Ok(())
}
