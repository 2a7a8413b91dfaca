//! Test doubles for the fetcher and executor seams.

use crate::scraper::client::Fetcher;
use crate::scraper::error::ScraperError;
use crate::scraper::executor::{Executor, Job};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Runs jobs inline on the submitting thread and counts them.
#[derive(Default)]
pub(crate) struct CountingExecutor {
    submitted: AtomicUsize,
}

impl CountingExecutor {
    pub(crate) fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

impl Executor for CountingExecutor {
    fn execute(&self, job: Job) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        job();
    }
}

/// Serves canned bodies by URL fragment (longest matching fragment wins).
///
/// Unknown URLs, and URLs containing a `fail` fragment, get HTTP 500.
/// Records every request in completion order.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    routes: Vec<(String, String)>,
    failures: Vec<String>,
    delays: Vec<(String, Duration)>,
    completed: Mutex<Vec<String>>,
    forms: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeFetcher {
    pub(crate) fn route(mut self, fragment: &str, body: impl Into<String>) -> Self {
        self.routes.push((fragment.to_string(), body.into()));
        self
    }

    pub(crate) fn fail(mut self, fragment: &str) -> Self {
        self.failures.push(fragment.to_string());
        self
    }

    pub(crate) fn delay(mut self, fragment: &str, ms: u64) -> Self {
        self.delays
            .push((fragment.to_string(), Duration::from_millis(ms)));
        self
    }

    /// URLs fetched so far, in completion order.
    pub(crate) fn completed(&self) -> Vec<String> {
        self.completed.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Forms posted so far, with their URLs.
    pub(crate) fn forms(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.forms.lock().map(|f| f.clone()).unwrap_or_default()
    }

    fn longest<'a, T>(entries: &'a [(String, T)], url: &str) -> Option<&'a T> {
        entries
            .iter()
            .filter(|(fragment, _)| url.contains(fragment.as_str()))
            .max_by_key(|(fragment, _)| fragment.len())
            .map(|(_, v)| v)
    }
}

impl Fetcher for FakeFetcher {
    fn get_text(&self, url: &str) -> Result<String, ScraperError> {
        if let Some(d) = Self::longest(&self.delays, url) {
            std::thread::sleep(*d);
        }
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(url.to_string());
        }
        if self.failures.iter().any(|f| url.contains(f.as_str())) {
            return Err(ScraperError::HttpStatus {
                status: 500,
                url: url.to_string(),
                context: None,
            });
        }
        Self::longest(&self.routes, url)
            .cloned()
            .ok_or_else(|| ScraperError::HttpStatus {
                status: 500,
                url: url.to_string(),
                context: None,
            })
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, ScraperError> {
        if let Ok(mut forms) = self.forms.lock() {
            forms.push((
                url.to_string(),
                form.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
        }
        self.get_text(url)
    }
}
