//! Blocking HTTP client shared by all crawlers, behind the [Fetcher] seam.

use crate::scraper::error::ScraperError;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

/// Document source used by crawlers and the page harvester.
///
/// Implementations must be shareable across executor worker threads. Bodies are
/// returned as text; callers parse them on their own thread.
pub trait Fetcher: Send + Sync {
    /// GET `url` and return the body of a 2xx response.
    fn get_text(&self, url: &str) -> Result<String, ScraperError>;

    /// POST `form` (urlencoded) to `url` and return the body of a 2xx response.
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, ScraperError>;
}

/// Blocking HTTP client with cookie store, browser-like User-Agent and request timeout.
///
/// Cheap to clone: clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }
}

impl Fetcher for HttpClient {
    fn get_text(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .inner
            .get(url)
            .send()
            .map_err(|e| ScraperError::Network {
                url: url.to_string(),
                source: e,
            })?;
        check_response(response, url)
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, ScraperError> {
        let response = self
            .inner
            .post(url)
            .form(form)
            .send()
            .map_err(|e| ScraperError::Network {
                url: url.to_string(),
                source: e,
            })?;
        check_response(response, url)
    }
}

/// Check response status and read body as text.
fn check_response(response: reqwest::blocking::Response, url: &str) -> Result<String, ScraperError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ScraperError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
            context: None,
        });
    }
    response.text().map_err(|e| ScraperError::BodyRead {
        url: url.to_string(),
        source: e,
    })
}

/// Builder for HttpClient with optional User-Agent and timeout.
#[derive(Debug)]
pub struct HttpClientBuilder {
    user_agent: Option<String>,
    timeout_secs: u64,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HttpClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(HttpClient { inner })
    }
}
