//! Configuration settings for Quizbank.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub database: DatabaseSettings,
    pub sources: SourceSettings,
    pub ingest: IngestSettings,
    pub embedding: EmbeddingSettings,
    pub reranker: RerankerSettings,
    pub search: SearchSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.quizbank".to_string(),
        }
    }
}

/// Question database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.quizbank/questions.db".to_string(),
        }
    }
}

/// Upstream trivia APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct SourceSettings {
    pub opentdb: OpenTdbSettings,
    pub the_trivia_api: TheTriviaApiSettings,
}

/// Open Trivia Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenTdbSettings {
    pub enabled: bool,
    pub base_url: String,
    /// Question type filter passed upstream (multiple, boolean).
    pub question_type: String,
}

impl Default for OpenTdbSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://opentdb.com".to_string(),
            question_type: "multiple".to_string(),
        }
    }
}

/// The Trivia API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TheTriviaApiSettings {
    pub enabled: bool,
    pub base_url: String,
    /// Category slugs to fetch.
    pub categories: Vec<String>,
    /// Number of requests issued per category.
    pub requests_per_category: usize,
}

impl Default for TheTriviaApiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://the-trivia-api.com".to_string(),
            categories: [
                "music",
                "sport_and_leisure",
                "film_and_tv",
                "arts_and_literature",
                "history",
                "society_and_culture",
                "science",
                "geography",
                "food_and_drink",
                "general_knowledge",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            requests_per_category: 5,
        }
    }
}

/// Ingestion loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Page sizes tried in order, shrinking when the upstream runs dry.
    pub page_sizes: Vec<usize>,
    /// Initial sleep after a rate-limited response.
    pub rate_limit_backoff_secs: u64,
    /// Upper bound for a single backoff sleep.
    pub max_backoff_secs: u64,
    /// Consecutive rate-limited responses tolerated before giving up on a category.
    pub max_rate_limit_retries: u32,
    /// Timeout for a single upstream request.
    pub request_timeout_secs: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            page_sizes: vec![50, 20, 10, 5, 1],
            rate_limit_backoff_secs: 5,
            max_backoff_secs: 60,
            max_rate_limit_retries: 8,
            request_timeout_secs: 30,
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Base URL of the embedding inference server.
    pub base_url: String,
    /// Embedding model served at `base_url`.
    pub model: String,
    /// Texts per inference request.
    pub batch_size: usize,
    /// Embedding requests in flight while indexing.
    pub max_concurrent: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            model: "BAAI/bge-m3".to_string(),
            batch_size: 32,
            max_concurrent: 2,
            timeout_secs: 120,
        }
    }
}

/// Cross-encoder reranker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerSettings {
    /// Base URL of the reranking inference server.
    pub base_url: String,
    /// Reranking model served at `base_url`.
    pub model: String,
    /// Query/document pairs per inference request.
    pub batch_size: usize,
    /// Map raw logits to 0-1 with a sigmoid.
    pub normalize_scores: bool,
    pub timeout_secs: u64,
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            model: "BAAI/bge-reranker-v2-m3".to_string(),
            batch_size: 32,
            normalize_scores: true,
            timeout_secs: 120,
        }
    }
}

/// Search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Candidates handed to the reranker in semantic mode.
    pub candidate_pool: usize,
    /// Results returned when no limit is given.
    pub default_limit: usize,
    /// Minimum reranker score kept in semantic mode, in the units of
    /// `reranker.normalize_scores` (0-1 or raw logits). Unset keeps every hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            candidate_pool: 100,
            default_limit: 10,
            min_score: None,
        }
    }
}

/// Search UI server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7860,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject settings the ingestion and search loops cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::QuizbankError;

        if self.ingest.page_sizes.is_empty() || self.ingest.page_sizes.contains(&0) {
            return Err(QuizbankError::Config(
                "ingest.page_sizes must be a non-empty list of positive sizes".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 || self.reranker.batch_size == 0 {
            return Err(QuizbankError::Config(
                "embedding.batch_size and reranker.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::QuizbankError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizbank")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.database.sqlite_path)
    }
}
