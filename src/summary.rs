use crate::error::SearchError;
use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_HOST: &str = "https://ja.wikipedia.org";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A user-supplied query, trimmed and guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTerm(String);

impl SearchTerm {
    pub fn parse(raw: &str) -> Result<Self, SearchError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SearchError::EmptyTerm);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl FromStr for SearchTerm {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for SearchTerm {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The resolved summary for one search, consumed once by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub title: String,
    pub extract: String,
    pub thumbnail_url: Option<String>,
    pub page_url: Option<String>,
}

impl SummaryResult {
    pub fn new(title: impl Into<String>, extract: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            extract: extract.into(),
            thumbnail_url: None,
            page_url: None,
        }
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Scheme and host of the encyclopedia, without a trailing slash.
    pub host: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!(
                "aigloss-rs/{} (AI glossary summary lookup)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

/// Where the controller gets summaries from.
///
/// `Ok(None)` means there is nothing to display. `Err` is reserved for backends that can fail
/// in ways the caller should present as an error panel.
#[async_trait]
pub trait SummarySource: Send + Sync {
    async fn lookup(&self, term: &SearchTerm) -> Result<Option<SummaryResult>, SearchError>;
}

#[derive(Debug, Error)]
enum FetchError {
    #[error("article not found")]
    NotFound,
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("malformed payload: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Encyclopedia summary lookups with a one-level suggestion fallback.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    client: Client,
    config: SummaryConfig,
}

impl WikipediaClient {
    pub fn new(config: SummaryConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| SearchError::transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    pub fn summary_url(&self, term: &str) -> String {
        format!(
            "{}/api/rest_v1/page/summary/{}",
            self.config.host.trim_end_matches('/'),
            encode_component(term)
        )
    }

    pub fn suggestion_url(&self, term: &str) -> String {
        format!(
            "{}/w/api.php?action=opensearch&search={}&limit=1&format=json&origin=*",
            self.config.host.trim_end_matches('/'),
            encode_component(term)
        )
    }

    /// Resolves `term` to a summary, or `None` when there is nothing to show.
    ///
    /// A 404 triggers exactly one suggestion lookup; the top suggestion gets one more
    /// summary request and no further fallback. Every failure is logged and folded into
    /// `None`.
    pub async fn fetch_summary(&self, term: &str) -> Option<SummaryResult> {
        match self.request_summary(term).await {
            Ok(payload) => Some(payload.into_result(term)),
            Err(FetchError::NotFound) => {
                debug!(term, "summary not found, trying suggestion lookup");
                self.fetch_via_suggestion(term).await
            }
            Err(err) => {
                warn!(term, error = %err, "summary lookup failed");
                None
            }
        }
    }

    async fn fetch_via_suggestion(&self, term: &str) -> Option<SummaryResult> {
        let suggestion = match self.request_suggestion(term).await {
            Ok(Some(suggestion)) => suggestion,
            Ok(None) => {
                info!(term, "no suggestion available");
                return None;
            }
            Err(err) => {
                warn!(term, error = %err, "suggestion lookup failed");
                return None;
            }
        };
        match self.request_summary(&suggestion).await {
            Ok(payload) => Some(payload.into_result(term)),
            Err(FetchError::NotFound) => {
                info!(term, %suggestion, "suggested article not found");
                None
            }
            Err(err) => {
                warn!(term, %suggestion, error = %err, "summary lookup for suggestion failed");
                None
            }
        }
    }

    async fn request_summary(&self, term: &str) -> Result<SummaryPayload, FetchError> {
        let response = self.client.get(self.summary_url(term)).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        response.json::<SummaryPayload>().await.map_err(FetchError::Decode)
    }

    async fn request_suggestion(&self, term: &str) -> Result<Option<String>, FetchError> {
        let response = self.client.get(self.suggestion_url(term)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body: serde_json::Value = response.json().await.map_err(FetchError::Decode)?;
        Ok(first_suggestion(&body))
    }
}

#[async_trait]
impl SummarySource for WikipediaClient {
    async fn lookup(&self, term: &SearchTerm) -> Result<Option<SummaryResult>, SearchError> {
        Ok(self.fetch_summary(term.as_str()).await)
    }
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    title: Option<String>,
    extract: Option<String>,
    thumbnail: Option<Thumbnail>,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    page: Option<String>,
}

impl SummaryPayload {
    fn into_result(self, original_term: &str) -> SummaryResult {
        SummaryResult {
            title: non_empty(self.title).unwrap_or_else(|| original_term.to_string()),
            extract: self.extract.unwrap_or_default(),
            thumbnail_url: non_empty(self.thumbnail.and_then(|thumb| thumb.source)),
            page_url: non_empty(
                self.content_urls
                    .and_then(|urls| urls.desktop)
                    .and_then(|links| links.page),
            ),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// OpenSearch answers `[query, [titles...], [descriptions...], [urls...]]`.
fn first_suggestion(body: &serde_json::Value) -> Option<String> {
    body.get(1)?
        .as_array()?
        .first()?
        .as_str()
        .filter(|title| !title.trim().is_empty())
        .map(str::to_string)
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}
