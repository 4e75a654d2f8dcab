//! Upstream trivia APIs.
//!
//! Every source is reduced to the same small protocol: list categories, then
//! request pages of questions and report what happened as a [`PageOutcome`].
//! The ingestion loop in [`crate::ingest`] decides what to do next.

mod opentdb;
mod the_trivia_api;

pub use opentdb::{OpenTdbSource, ResponseCode};
pub use the_trivia_api::TheTriviaApiSource;

use crate::config::Settings;
use crate::error::{QuizbankError, Result};
use crate::question::NewQuestion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// An upstream category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identifier passed back upstream.
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Result of a single page request.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Standardized questions (possibly none).
    Questions(Vec<NewQuestion>),
    /// Not enough questions left for this page size; try a smaller one.
    ShrinkPage,
    /// The upstream asked us to slow down; retry the same request later.
    RateLimited,
    /// Nothing more can be fetched for this category.
    Abort(String),
}

/// Which upstream to ingest from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    OpenTdb,
    TheTriviaApi,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opentdb" | "open-tdb" => Ok(SourceKind::OpenTdb),
            "the-trivia-api" | "thetriviaapi" | "trivia-api" => Ok(SourceKind::TheTriviaApi),
            _ => Err(format!("Unknown trivia source: {}", s)),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::OpenTdb => write!(f, "opentdb"),
            SourceKind::TheTriviaApi => write!(f, "the-trivia-api"),
        }
    }
}

/// Trait for upstream trivia APIs.
#[async_trait]
pub trait TriviaSource: Send + Sync {
    /// Value stored in the `source` column.
    fn name(&self) -> &str;

    /// Per-run setup such as acquiring a session token.
    async fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Categories to walk.
    async fn categories(&self) -> Result<Vec<Category>>;

    /// Request up to `amount` questions from a category.
    async fn fetch_page(&self, category: &Category, amount: usize) -> Result<PageOutcome>;

    /// `None` pages until the category is exhausted, `Some(n)` issues exactly
    /// `n` requests per category.
    fn request_budget(&self) -> Option<usize>;
}

/// Create the HTTP client used for upstream requests.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("quizbank/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(QuizbankError::Http)
}

/// Parse a base URL so relative endpoints join beneath it.
pub(crate) fn base_url(raw: &str) -> Result<Url> {
    Ok(Url::parse(&format!("{}/", raw.trim_end_matches('/')))?)
}

/// Build the enabled sources, optionally restricted to one kind.
pub fn build_sources(
    settings: &Settings,
    only: Option<SourceKind>,
) -> Result<Vec<Box<dyn TriviaSource>>> {
    let client = http_client(Duration::from_secs(settings.ingest.request_timeout_secs))?;
    let wanted = |kind: SourceKind| only.map_or(true, |o| o == kind);

    let mut sources: Vec<Box<dyn TriviaSource>> = Vec::new();

    let opentdb = &settings.sources.opentdb;
    if wanted(SourceKind::OpenTdb) && (opentdb.enabled || only.is_some()) {
        sources.push(Box::new(OpenTdbSource::new(
            client.clone(),
            &opentdb.base_url,
            &opentdb.question_type,
        )?));
    }

    let tta = &settings.sources.the_trivia_api;
    if wanted(SourceKind::TheTriviaApi) && (tta.enabled || only.is_some()) {
        sources.push(Box::new(TheTriviaApiSource::new(
            client,
            &tta.base_url,
            tta.categories.clone(),
            tta.requests_per_category,
        )?));
    }

    Ok(sources)
}
