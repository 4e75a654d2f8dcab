//! Clients for a text-embeddings-inference server.
//!
//! `POST /embed` returns one vector per input; `POST /rerank` returns
//! `{index, score}` pairs sorted by score, which are mapped back to input order.

use super::{l2_normalize, Embedder, Reranker};
use crate::config::{EmbeddingSettings, RerankerSettings};
use crate::error::{QuizbankError, Result};
use crate::sources::base_url;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(QuizbankError::Http)
}

async fn error_body(res: reqwest::Response) -> String {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    format!("{}: {}", status, body)
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    normalize: bool,
    truncate: bool,
}

/// Embedder backed by a text-embeddings-inference `/embed` endpoint.
pub struct TeiEmbedder {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    batch_size: usize,
}

impl TeiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        Ok(Self {
            client: client(settings.timeout_secs)?,
            endpoint: base_url(&settings.base_url)?.join("embed")?,
            model: settings.model.clone(),
            batch_size: settings.batch_size.max(1),
        })
    }
}

#[async_trait]
impl Embedder for TeiEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let res = self
                .client
                .post(self.endpoint.clone())
                .json(&EmbedRequest {
                    inputs: chunk,
                    normalize: true,
                    truncate: true,
                })
                .send()
                .await?;

            if !res.status().is_success() {
                return Err(QuizbankError::Embedding(error_body(res).await));
            }

            let embeddings: Vec<Vec<f32>> = res.json().await?;
            if embeddings.len() != chunk.len() {
                return Err(QuizbankError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    chunk.len(),
                    embeddings.len()
                )));
            }

            all_embeddings.extend(embeddings.into_iter().map(|mut e| {
                l2_normalize(&mut e);
                e
            }));
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
    truncate: bool,
}

#[derive(Deserialize)]
struct RankedText {
    index: usize,
    score: f32,
}

/// Cross-encoder reranker backed by a text-embeddings-inference `/rerank`
/// endpoint.
pub struct TeiReranker {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    batch_size: usize,
}

impl TeiReranker {
    pub fn new(settings: &RerankerSettings) -> Result<Self> {
        Ok(Self {
            client: client(settings.timeout_secs)?,
            endpoint: base_url(&settings.base_url)?.join("rerank")?,
            model: settings.model.clone(),
            batch_size: settings.batch_size.max(1),
        })
    }

    /// Score one request worth of documents, in document order.
    async fn score_batch(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let res = self
            .client
            .post(self.endpoint.clone())
            .json(&RerankRequest {
                query,
                texts: documents,
                raw_scores: true,
                truncate: true,
            })
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(QuizbankError::Rerank(error_body(res).await));
        }

        let ranked: Vec<RankedText> = res.json().await?;

        let mut scores: Vec<Option<f32>> = vec![None; documents.len()];
        for r in ranked {
            let slot = scores.get_mut(r.index).ok_or_else(|| {
                QuizbankError::Rerank(format!("score for unknown document index {}", r.index))
            })?;
            *slot = Some(r.score);
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                s.ok_or_else(|| QuizbankError::Rerank(format!("no score for document {}", i)))
            })
            .collect()
    }
}

#[async_trait]
impl Reranker for TeiReranker {
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(documents.len());
        for batch in documents.chunks(self.batch_size) {
            scores.extend(self.score_batch(query, batch).await?);
        }
        debug!("Scored {} documents", scores.len());
        Ok(scores)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
