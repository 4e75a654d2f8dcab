//! Question ingestion pipeline.
//!
//! Walks every category of a [`TriviaSource`], pages through it with a
//! shrinking page-size ladder, backs off when rate limited, and stores each
//! question whose exact text is not already known.

use crate::config::IngestSettings;
use crate::error::{QuizbankError, Result};
use crate::question::NewQuestion;
use crate::sources::{Category, PageOutcome, TriviaSource};
use crate::store::QuestionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Sleeps between rate-limited retries.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How a category ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CategoryStatus {
    /// Exhausted or request budget spent.
    Completed,
    /// The upstream refused further requests.
    Aborted(String),
    /// A request failed or rate limiting never cleared.
    Failed(String),
}

/// Ingestion statistics for one category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub source: String,
    pub category: String,
    pub inserted: usize,
    pub duplicates: usize,
    pub requests: usize,
    pub rate_limited: usize,
    pub status: CategoryStatus,
}

impl CategoryReport {
    fn new(source: &str, category: &Category) -> Self {
        Self {
            source: source.to_string(),
            category: category.name.clone(),
            inserted: 0,
            duplicates: 0,
            requests: 0,
            rate_limited: 0,
            status: CategoryStatus::Completed,
        }
    }
}

/// Ingestion statistics for one source run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub categories: Vec<CategoryReport>,
}

impl IngestReport {
    pub fn inserted(&self) -> usize {
        self.categories.iter().map(|c| c.inserted).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.categories.iter().map(|c| c.duplicates).sum()
    }

    pub fn failed(&self) -> usize {
        self.categories
            .iter()
            .filter(|c| matches!(c.status, CategoryStatus::Failed(_)))
            .count()
    }
}

/// Drives sources into a question store.
pub struct Ingestor {
    store: Arc<dyn QuestionStore>,
    settings: IngestSettings,
    sleeper: Arc<dyn Sleeper>,
    progress: Option<ProgressBar>,
}

impl Ingestor {
    /// Create an ingestor that sleeps on the tokio timer.
    pub fn new(store: Arc<dyn QuestionStore>, settings: IngestSettings) -> Result<Self> {
        Self::with_sleeper(store, settings, Arc::new(TokioSleeper))
    }

    /// Create an ingestor with a custom sleeper.
    pub fn with_sleeper(
        store: Arc<dyn QuestionStore>,
        settings: IngestSettings,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        if settings.page_sizes.is_empty() {
            return Err(QuizbankError::Config("ingest.page_sizes is empty".to_string()));
        }
        Ok(Self {
            store,
            settings,
            sleeper,
            progress: None,
        })
    }

    /// Report per-category progress on a progress bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Delay before the `attempt`-th consecutive retry (0-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        let secs = self
            .settings
            .rate_limit_backoff_secs
            .saturating_mul(factor)
            .min(self.settings.max_backoff_secs);
        Duration::from_secs(secs)
    }

    /// Ingest every category of `source`.
    ///
    /// Failures inside a category are recorded in its report and the run
    /// moves on. Setup failures and store errors abort the run.
    #[instrument(skip_all, fields(source = %source.name()))]
    pub async fn run(&self, source: &mut dyn TriviaSource) -> Result<IngestReport> {
        let started_at = Utc::now();

        source.prepare().await?;
        let categories = source.categories().await?;
        info!("Ingesting {} categories from {}", categories.len(), source.name());

        if let Some(pb) = &self.progress {
            pb.set_length(categories.len() as u64);
            pb.set_position(0);
        }

        let mut reports = Vec::with_capacity(categories.len());
        for category in &categories {
            if let Some(pb) = &self.progress {
                pb.set_message(category.name.clone());
            }

            let report = self.ingest_category(&*source, category).await?;
            info!(
                "{}: {} new, {} duplicates, {} requests",
                category.name, report.inserted, report.duplicates, report.requests
            );
            reports.push(report);

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        Ok(IngestReport {
            source: source.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            categories: reports,
        })
    }

    #[instrument(skip(self, source), fields(category = %category.name))]
    async fn ingest_category(
        &self,
        source: &dyn TriviaSource,
        category: &Category,
    ) -> Result<CategoryReport> {
        let mut report = CategoryReport::new(source.name(), category);
        let ladder = &self.settings.page_sizes;
        let budget = source.request_budget();

        let mut rung = 0;
        let mut seen: HashSet<String> = HashSet::new();
        let mut consecutive_limits = 0u32;

        loop {
            if budget.is_some_and(|b| report.requests >= b) {
                break;
            }

            let amount = ladder[rung];
            let outcome = match source.fetch_page(category, amount).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Request for {} failed: {}", category.name, e);
                    report.status = CategoryStatus::Failed(e.to_string());
                    break;
                }
            };

            if outcome != PageOutcome::RateLimited {
                consecutive_limits = 0;
                report.requests += 1;
            }

            match outcome {
                PageOutcome::Questions(questions) => {
                    if questions.is_empty() && budget.is_none() {
                        break;
                    }
                    let unseen = self.store_page(questions, &mut seen, &mut report).await?;
                    // An unbounded source that only repeats itself has nothing left.
                    if unseen == 0 && budget.is_none() {
                        debug!("Page held no unseen questions, stopping");
                        break;
                    }
                }
                PageOutcome::ShrinkPage => {
                    rung += 1;
                    if rung >= ladder.len() {
                        break;
                    }
                    debug!("Shrinking page size to {}", ladder[rung]);
                }
                PageOutcome::RateLimited => {
                    report.rate_limited += 1;
                    if consecutive_limits >= self.settings.max_rate_limit_retries {
                        report.status = CategoryStatus::Failed(format!(
                            "still rate limited after {} retries",
                            consecutive_limits
                        ));
                        break;
                    }
                    let delay = self.backoff_delay(consecutive_limits);
                    consecutive_limits += 1;
                    debug!("Rate limited, sleeping {:?}", delay);
                    self.sleeper.sleep(delay).await;
                }
                PageOutcome::Abort(reason) => {
                    report.status = CategoryStatus::Aborted(reason);
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Store a page, returning how many questions were unseen in this run.
    async fn store_page(
        &self,
        questions: Vec<NewQuestion>,
        seen: &mut HashSet<String>,
        report: &mut CategoryReport,
    ) -> Result<usize> {
        let mut unseen = 0;

        for question in questions {
            if !seen.insert(question.question.clone()) {
                continue;
            }
            unseen += 1;

            if self.store.exists(&question.question).await? {
                report.duplicates += 1;
                continue;
            }
            if self.store.insert(&question).await? {
                report.inserted += 1;
            } else {
                report.duplicates += 1;
            }
        }

        Ok(unseen)
    }
}
