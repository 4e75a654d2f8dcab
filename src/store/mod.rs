//! Question store abstraction for Quizbank.
//!
//! Questions live in SQLite; exact question text is the deduplication key.
//! Embeddings are kept next to the questions for nearest-neighbour candidate
//! retrieval ahead of reranking.

mod sqlite;

pub use sqlite::SqliteQuestionStore;

use crate::error::Result;
use crate::question::{NewQuestion, Question};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Restricts a question listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionFilter {
    /// Case-insensitive substring of the question text. Empty matches everything.
    pub text: String,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub source: Option<String>,
    pub limit: Option<usize>,
}

impl QuestionFilter {
    /// Filter on question text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Number of questions in a category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

/// Number of questions contributed by a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceCount {
    pub source: String,
    pub count: usize,
}

/// Trait for question store implementations.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Insert a question. Returns `false` when the exact text is already stored.
    async fn insert(&self, question: &NewQuestion) -> Result<bool>;

    /// Insert many questions in one transaction. Returns how many were new.
    async fn insert_batch(&self, questions: &[NewQuestion]) -> Result<usize>;

    /// Check whether the exact question text is stored.
    async fn exists(&self, text: &str) -> Result<bool>;

    /// Get a question by ID.
    async fn get(&self, id: i64) -> Result<Option<Question>>;

    /// List questions matching a filter, ordered by ID.
    async fn filter(&self, filter: &QuestionFilter) -> Result<Vec<Question>>;

    /// Total question count.
    async fn count(&self) -> Result<usize>;

    /// Question counts per source.
    async fn count_by_source(&self) -> Result<Vec<SourceCount>>;

    /// Distinct categories with question counts.
    async fn categories(&self) -> Result<Vec<CategoryCount>>;

    /// Store embeddings computed with `model`, replacing previous ones.
    async fn store_embeddings(&self, model: &str, embeddings: &[(i64, Vec<f32>)]) -> Result<usize>;

    /// Questions that have no embedding for `model` yet.
    async fn missing_embeddings(&self, model: &str, limit: usize) -> Result<Vec<Question>>;

    /// Number of questions embedded with `model`.
    async fn embedding_count(&self, model: &str) -> Result<usize>;

    /// Questions closest to `query` by cosine similarity, best first.
    async fn nearest(&self, model: &str, query: &[f32], limit: usize) -> Result<Vec<(Question, f32)>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![2.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }
}
