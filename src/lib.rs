//! Quizbank - trivia question bank with semantic search
//!
//! A local-first tool that collects trivia questions from public APIs and
//! searches them by plain text or by relevance to a theme.
//!
//! # Overview
//!
//! Quizbank allows you to:
//! - Fetch questions from the Open Trivia Database and The Trivia API
//! - Keep them deduplicated in a local SQLite database
//! - Rank questions against a theme with a cross-encoder reranker
//! - Browse the bank from a small web UI
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `question` - Question types and HTML entity decoding
//! - `store` - SQLite question store and stored embeddings
//! - `sources` - Upstream trivia API clients
//! - `ingest` - Paging, backoff and deduplication loop
//! - `inference` - Embedding and reranking clients
//! - `search` - Substring and semantic search
//! - `orchestrator` - Pipeline coordination
//! - `server` - Search UI
//!
//! # Example
//!
//! ```rust,no_run
//! use quizbank::config::Settings;
//! use quizbank::orchestrator::Orchestrator;
//! use quizbank::search::SearchRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     orchestrator.ingest(None, None).await?;
//!
//!     let engine = orchestrator.search_engine(true)?;
//!     for hit in engine.search(&SearchRequest::semantic("space exploration")).await? {
//!         println!("{:.3} {}", hit.score.unwrap_or_default(), hit.question.question);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod ingest;
pub mod orchestrator;
pub mod question;
pub mod search;
pub mod server;
pub mod sources;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{QuizbankError, Result};
