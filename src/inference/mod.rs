//! Pretrained model access for semantic search.
//!
//! Inference runs in an external server speaking the text-embeddings-inference
//! HTTP protocol. This module only batches requests, normalizes scores and
//! orders results.

mod probe;
mod tei;

pub use probe::{ModelInfo, ModelProbe};
pub use tei::{TeiEmbedder, TeiReranker};

use crate::error::{QuizbankError, Result};
use crate::question::Question;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QuizbankError::Embedding("Empty embedding response".to_string()))
    }

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier, used to key stored embeddings.
    fn model(&self) -> &str;
}

/// Trait for cross-encoder relevance scoring.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Raw relevance scores (logits) of each document against `query`, in
    /// document order.
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;

    fn model(&self) -> &str;
}

/// A question with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredQuestion {
    pub question: Question,
    pub score: f32,
}

/// Sigmoid normalization: maps raw logits to 0-1 range.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Rerank questions by relevance to `theme`, best first.
///
/// Pairs are scored `batch_size` at a time. Ties keep their input order.
#[instrument(skip(reranker, questions), fields(count = questions.len()))]
pub async fn rerank_questions(
    reranker: &dyn Reranker,
    theme: &str,
    questions: Vec<Question>,
    batch_size: usize,
    normalize: bool,
) -> Result<Vec<ScoredQuestion>> {
    if questions.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = questions.iter().map(|q| q.question.clone()).collect();
    let mut scores = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        let batch_scores = reranker.score(theme, batch).await?;
        if batch_scores.len() != batch.len() {
            return Err(QuizbankError::Rerank(format!(
                "expected {} scores, got {}",
                batch.len(),
                batch_scores.len()
            )));
        }
        scores.extend(
            batch_scores
                .into_iter()
                .map(|s| if normalize { sigmoid(s) } else { s }),
        );
    }

    let mut scored: Vec<ScoredQuestion> = questions
        .into_iter()
        .zip(scores)
        .map(|(question, score)| ScoredQuestion { question, score })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    debug!("Reranked {} questions", scored.len());
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
        assert!((sigmoid(2.5) + sigmoid(-2.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    /// Scores a document by how many times it mentions the query.
    struct CountingReranker {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Reranker for CountingReranker {
        async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
            self.batches.lock().unwrap().push(documents.len());
            Ok(documents
                .iter()
                .map(|d| d.to_lowercase().matches(&query.to_lowercase()).count() as f32 - 1.0)
                .collect())
        }

        fn model(&self) -> &str {
            "counting"
        }
    }

    fn question(id: i64, text: &str) -> Question {
        Question {
            id,
            question: text.to_string(),
            correct_answer: String::new(),
            incorrect_answers: vec![],
            category: String::new(),
            difficulty: String::new(),
            kind: String::new(),
            source: String::new(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_rerank_batches_normalizes_and_sorts() {
        let reranker = CountingReranker { batches: Mutex::new(vec![]) };
        let questions = vec![
            question(1, "What colour is the flag of Canada?"),
            question(2, "Who wrote the Harry Potter series?"),
            question(3, "Harry Potter: which house is Harry in?"),
            question(4, "What is 2 + 2?"),
            question(5, "Name the capital of France"),
        ];

        let ranked = rerank_questions(&reranker, "harry", questions, 2, true)
            .await
            .unwrap();

        assert_eq!(*reranker.batches.lock().unwrap(), vec![2, 2, 1]);
        let ids: Vec<i64> = ranked.iter().map(|s| s.question.id).collect();
        assert_eq!(ids, vec![3, 2, 1, 4, 5]);
        assert!(ranked.iter().all(|s| s.score > 0.0 && s.score < 1.0));
        assert!((ranked[1].score - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rerank_raw_scores_and_empty_input() {
        let reranker = CountingReranker { batches: Mutex::new(vec![]) };

        let ranked = rerank_questions(&reranker, "x", vec![], 32, true).await.unwrap();
        assert!(ranked.is_empty());
        assert!(reranker.batches.lock().unwrap().is_empty());

        let ranked = rerank_questions(&reranker, "a", vec![question(1, "aaa")], 32, false)
            .await
            .unwrap();
        assert_eq!(ranked[0].score, 2.0);
    }
}
