//! Question search: plain substring filtering and semantic reranking.

use crate::config::{RerankerSettings, SearchSettings};
use crate::error::{QuizbankError, Result};
use crate::inference::{rerank_questions, Embedder, Reranker};
use crate::question::Question;
use crate::store::{QuestionFilter, QuestionStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How a query is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Case-insensitive substring of the question text.
    #[default]
    Substring,
    /// Cross-encoder relevance to a theme.
    Semantic,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "substring" | "text" | "plain" => Ok(SearchMode::Substring),
            "semantic" | "rerank" => Ok(SearchMode::Semantic),
            _ => Err(format!("Unknown search mode: {}", s)),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchMode::Substring => write!(f, "substring"),
            SearchMode::Semantic => write!(f, "semantic"),
        }
    }
}

/// A search query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub source: Option<String>,
    pub limit: Option<usize>,
    /// Semantic mode only: drop results scoring below this.
    pub min_score: Option<f32>,
}

impl SearchRequest {
    pub fn substring(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn semantic(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::Semantic,
            ..Default::default()
        }
    }

    fn field_filter(&self) -> QuestionFilter {
        QuestionFilter {
            text: String::new(),
            category: self.category.clone(),
            difficulty: self.difficulty.clone(),
            source: self.source.clone(),
            limit: None,
        }
    }

    fn matches_fields(&self, q: &Question) -> bool {
        self.category.as_ref().map_or(true, |c| &q.category == c)
            && self.difficulty.as_ref().map_or(true, |d| &q.difficulty == d)
            && self.source.as_ref().map_or(true, |s| &q.source == s)
    }
}

/// A search result. Substring hits carry no score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub question: Question,
    pub score: Option<f32>,
}

/// Runs searches against a question store.
pub struct SearchEngine {
    store: Arc<dyn QuestionStore>,
    embedder: Option<Arc<dyn Embedder>>,
    reranker: Option<Arc<dyn Reranker>>,
    settings: SearchSettings,
    rerank_batch_size: usize,
    normalize_scores: bool,
}

impl SearchEngine {
    /// Create a substring-only engine.
    pub fn new(store: Arc<dyn QuestionStore>, settings: SearchSettings) -> Self {
        let rerank = RerankerSettings::default();
        Self {
            store,
            embedder: None,
            reranker: None,
            settings,
            rerank_batch_size: rerank.batch_size,
            normalize_scores: rerank.normalize_scores,
        }
    }

    /// Enable semantic mode with a reranker.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>, settings: &RerankerSettings) -> Self {
        self.reranker = Some(reranker);
        self.rerank_batch_size = settings.batch_size;
        self.normalize_scores = settings.normalize_scores;
        self
    }

    /// Use stored embeddings to pick rerank candidates.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn store(&self) -> Arc<dyn QuestionStore> {
        self.store.clone()
    }

    pub fn has_reranker(&self) -> bool {
        self.reranker.is_some()
    }

    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    #[instrument(skip(self), fields(mode = %request.mode))]
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let limit = request.limit.unwrap_or(self.settings.default_limit);

        match request.mode {
            SearchMode::Substring => {
                let mut filter = request.field_filter();
                filter.text = request.query.clone();
                filter.limit = Some(limit);

                let questions = self.store.filter(&filter).await?;
                debug!("Substring search matched {} questions", questions.len());
                Ok(questions
                    .into_iter()
                    .map(|question| SearchHit { question, score: None })
                    .collect())
            }
            SearchMode::Semantic => self.semantic(request, limit).await,
        }
    }

    async fn semantic(&self, request: &SearchRequest, limit: usize) -> Result<Vec<SearchHit>> {
        let reranker = self.reranker.as_ref().ok_or_else(|| {
            QuizbankError::InvalidInput("semantic search needs a configured reranker".to_string())
        })?;

        let theme = request.query.trim();
        if theme.is_empty() {
            return Err(QuizbankError::InvalidInput(
                "semantic search needs a non-empty theme".to_string(),
            ));
        }

        let candidates = self.candidates(request, theme).await?;
        info!("Reranking {} candidates for '{}'", candidates.len(), theme);

        let min_score = request.min_score.or(self.settings.min_score);
        let ranked = rerank_questions(
            &**reranker,
            theme,
            candidates,
            self.rerank_batch_size,
            self.normalize_scores,
        )
        .await?;

        Ok(ranked
            .into_iter()
            .filter(|s| min_score.map_or(true, |m| s.score >= m))
            .take(limit)
            .map(|s| SearchHit {
                question: s.question,
                score: Some(s.score),
            })
            .collect())
    }

    /// Nearest neighbours by embedding when available, else the first
    /// questions matching the field filters.
    async fn candidates(&self, request: &SearchRequest, theme: &str) -> Result<Vec<Question>> {
        let pool = self.settings.candidate_pool.max(1);

        if let Some(embedder) = &self.embedder {
            if self.store.embedding_count(embedder.model()).await? > 0 {
                match embedder.embed(theme).await {
                    Ok(query) => {
                        let nearest =
                            self.store.nearest(embedder.model(), &query, usize::MAX).await?;
                        return Ok(nearest
                            .into_iter()
                            .map(|(q, _)| q)
                            .filter(|q| request.matches_fields(q))
                            .take(pool)
                            .collect());
                    }
                    Err(e) => warn!("Theme embedding failed, using field filter: {}", e),
                }
            } else {
                debug!("No stored embeddings for {}, using field filter", embedder.model());
            }
        }

        let mut filter = request.field_filter();
        filter.limit = Some(pool);
        self.store.filter(&filter).await
    }
}
