//! Configuration module for Quizbank.
//!
//! Handles loading and saving application settings.

mod settings;

pub use settings::{
    DatabaseSettings, EmbeddingSettings, GeneralSettings, IngestSettings, OpenTdbSettings,
    RerankerSettings, SearchSettings, ServerSettings, Settings, SourceSettings,
    TheTriviaApiSettings,
};
