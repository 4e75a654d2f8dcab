//! Pipeline orchestrator for Quizbank.
//!
//! Wires settings to the question store, the upstream sources, and the
//! inference clients.

use crate::config::Settings;
use crate::error::{QuizbankError, Result};
use crate::inference::{Embedder, TeiEmbedder, TeiReranker};
use crate::ingest::{IngestReport, Ingestor};
use crate::search::SearchEngine;
use crate::sources::{build_sources, SourceKind};
use crate::store::{QuestionStore, SqliteQuestionStore};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Result of an embedding indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexResult {
    pub embedded: usize,
    pub batches: usize,
}

/// The main orchestrator for the Quizbank pipeline.
pub struct Orchestrator {
    settings: Settings,
    store: Arc<SqliteQuestionStore>,
}

impl Orchestrator {
    /// Open the configured question store.
    pub fn new(settings: Settings) -> Result<Self> {
        let store = Arc::new(SqliteQuestionStore::new(&settings.sqlite_path())?);
        Ok(Self { settings, store })
    }

    /// Create an orchestrator around an existing store.
    pub fn with_store(settings: Settings, store: Arc<SqliteQuestionStore>) -> Self {
        Self { settings, store }
    }

    /// Get a reference to the question store (as trait object).
    pub fn store(&self) -> Arc<dyn QuestionStore> {
        self.store.clone() as Arc<dyn QuestionStore>
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ingest from every enabled source, or only `only`.
    ///
    /// A source that fails during setup is logged and skipped.
    #[instrument(skip(self, progress))]
    pub async fn ingest(
        &self,
        only: Option<SourceKind>,
        progress: Option<ProgressBar>,
    ) -> Result<Vec<IngestReport>> {
        let mut ingestor = Ingestor::new(self.store(), self.settings.ingest.clone())?;
        if let Some(pb) = progress {
            ingestor = ingestor.with_progress(pb);
        }

        let mut reports = Vec::new();
        for mut source in build_sources(&self.settings, only)? {
            match ingestor.run(source.as_mut()).await {
                Ok(report) => {
                    info!(
                        "{}: {} new questions, {} duplicates",
                        report.source,
                        report.inserted(),
                        report.duplicates()
                    );
                    reports.push(report);
                }
                Err(e) => warn!("Ingestion from {} failed: {}", source.name(), e),
            }
        }

        Ok(reports)
    }

    /// Embed every question that has no embedding for the configured model.
    #[instrument(skip(self, progress))]
    pub async fn index_embeddings(&self, progress: Option<ProgressBar>) -> Result<IndexResult> {
        let embedder: Arc<dyn Embedder> = Arc::new(TeiEmbedder::new(&self.settings.embedding)?);
        self.index_with(embedder, progress).await
    }

    /// Embed missing questions with a given embedder.
    pub async fn index_with(
        &self,
        embedder: Arc<dyn Embedder>,
        progress: Option<ProgressBar>,
    ) -> Result<IndexResult> {
        let batch_size = self.settings.embedding.batch_size.max(1);
        let concurrency = self.settings.embedding.max_concurrent.max(1);
        let model = embedder.model().to_string();

        if let Some(pb) = &progress {
            let total = self.store.count().await?;
            let done = self.store.embedding_count(&model).await?;
            pb.set_length(total.saturating_sub(done) as u64);
        }

        let mut result = IndexResult::default();
        loop {
            let pending = self
                .store
                .missing_embeddings(&model, batch_size * concurrency)
                .await?;
            if pending.is_empty() {
                break;
            }

            let batches: Vec<Vec<(i64, String)>> = pending
                .chunks(batch_size)
                .map(|chunk| chunk.iter().map(|q| (q.id, q.question.clone())).collect())
                .collect();

            let embedded: Vec<Result<Vec<(i64, Vec<f32>)>>> = stream::iter(batches)
                .map(|batch| {
                    let embedder = embedder.clone();
                    async move {
                        let texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
                        let vectors = embedder.embed_batch(&texts).await?;
                        if vectors.len() != batch.len() {
                            return Err(QuizbankError::Embedding(format!(
                                "expected {} embeddings, got {}",
                                batch.len(),
                                vectors.len()
                            )));
                        }
                        let pairs: Vec<(i64, Vec<f32>)> =
                            batch.into_iter().map(|(id, _)| id).zip(vectors).collect();
                        Ok::<_, QuizbankError>(pairs)
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for batch in embedded {
                let batch = batch?;
                self.store.store_embeddings(&model, &batch).await?;
                result.embedded += batch.len();
                result.batches += 1;
                if let Some(pb) = &progress {
                    pb.inc(batch.len() as u64);
                }
            }
        }

        info!("Embedded {} questions with {}", result.embedded, model);
        Ok(result)
    }

    /// Build a search engine; semantic mode is wired when `semantic` is set.
    pub fn search_engine(&self, semantic: bool) -> Result<SearchEngine> {
        self.search_engine_with(semantic, semantic)
    }

    /// Build a search engine with the reranker and the candidate embedder
    /// wired independently.
    pub fn search_engine_with(&self, reranker: bool, embedder: bool) -> Result<SearchEngine> {
        let mut engine = SearchEngine::new(self.store(), self.settings.search.clone());
        if reranker {
            engine = engine.with_reranker(
                Arc::new(TeiReranker::new(&self.settings.reranker)?),
                &self.settings.reranker,
            );
        }
        if embedder {
            engine = engine.with_embedder(Arc::new(TeiEmbedder::new(&self.settings.embedding)?));
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::NewQuestion;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct LengthEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn model(&self) -> &str {
            "length"
        }
    }

    #[tokio::test]
    async fn test_index_embeds_missing_questions_once() {
        let mut settings = Settings::default();
        settings.embedding.batch_size = 2;
        settings.embedding.max_concurrent = 2;

        let store = Arc::new(SqliteQuestionStore::in_memory().unwrap());
        for i in 0..5 {
            store
                .insert(&NewQuestion {
                    question: format!("Question {}?", i),
                    correct_answer: "a".to_string(),
                    incorrect_answers: vec![],
                    category: "c".to_string(),
                    difficulty: "easy".to_string(),
                    kind: "multiple".to_string(),
                    source: "OpenTDB".to_string(),
                })
                .await
                .unwrap();
        }

        let orchestrator = Orchestrator::with_store(settings, store.clone());
        let embedder = Arc::new(LengthEmbedder { calls: AtomicUsize::new(0) });

        let result = orchestrator.index_with(embedder.clone(), None).await.unwrap();
        assert_eq!(result.embedded, 5);
        assert_eq!(result.batches, 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.embedding_count("length").await.unwrap(), 5);

        let again = orchestrator.index_with(embedder, None).await.unwrap();
        assert_eq!(again.embedded, 0);
    }

    /// Drops the last vector of every batch.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }

        fn model(&self) -> &str {
            "short"
        }
    }

    #[tokio::test]
    async fn test_index_rejects_short_embedding_batch() {
        let store = Arc::new(SqliteQuestionStore::in_memory().unwrap());
        store
            .insert(&NewQuestion {
                question: "Only question?".to_string(),
                correct_answer: "a".to_string(),
                incorrect_answers: vec![],
                category: "c".to_string(),
                difficulty: "easy".to_string(),
                kind: "multiple".to_string(),
                source: "OpenTDB".to_string(),
            })
            .await
            .unwrap();

        let orchestrator = Orchestrator::with_store(Settings::default(), store.clone());
        let err = orchestrator
            .index_with(Arc::new(ShortEmbedder), None)
            .await
            .unwrap_err();

        assert!(matches!(err, QuizbankError::Embedding(_)));
        assert_eq!(store.embedding_count("short").await.unwrap(), 0);
    }

    #[test]
    fn test_search_engine_wiring() {
        let store = Arc::new(SqliteQuestionStore::in_memory().unwrap());
        let orchestrator = Orchestrator::with_store(Settings::default(), store);

        assert!(!orchestrator.search_engine(false).unwrap().has_reranker());
        assert!(orchestrator.search_engine(true).unwrap().has_reranker());

        let without_embedder = orchestrator.search_engine_with(true, false).unwrap();
        assert!(without_embedder.has_reranker());
        assert!(!without_embedder.has_embedder());
        assert!(orchestrator.search_engine(true).unwrap().has_embedder());
    }
}
