//! Error types for Quizbank.

use thiserror::Error;

/// Library-level error type for Quizbank operations.
#[derive(Error, Debug)]
pub enum QuizbankError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trivia source error: {0}")]
    Source(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Reranking failed: {0}")]
    Rerank(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Question store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Quizbank operations.
pub type Result<T> = std::result::Result<T, QuizbankError>;
