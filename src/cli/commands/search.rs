//! Search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::inference::ModelProbe;
use crate::orchestrator::Orchestrator;
use crate::search::{SearchMode, SearchRequest};
use anyhow::Result;
use std::time::Duration;

/// Arguments of the search command.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub query: String,
    pub semantic: bool,
    pub limit: Option<usize>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub min_score: Option<f32>,
    pub json: bool,
}

impl SearchArgs {
    fn request(&self) -> SearchRequest {
        SearchRequest {
            query: self.query.clone(),
            mode: if self.semantic {
                SearchMode::Semantic
            } else {
                SearchMode::Substring
            },
            category: self.category.clone(),
            difficulty: self.difficulty.clone(),
            source: None,
            limit: self.limit,
            min_score: self.min_score,
        }
    }
}

/// Run the search command.
pub async fn run_search(args: SearchArgs, settings: Settings) -> Result<()> {
    // Without the embedding server, candidates come from the field filters.
    let nearest = args.semantic
        && ModelProbe::new(Duration::from_secs(10))?
            .ensure_ready(&settings.embedding.base_url, &settings.embedding.model)
            .await
            .is_ok();

    let orchestrator = Orchestrator::new(settings)?;
    let engine = orchestrator.search_engine_with(args.semantic, nearest)?;
    let request = args.request();

    let spinner = Output::spinner(if args.semantic { "Ranking..." } else { "Searching..." });
    let results = engine.search(&request).await;
    spinner.finish_and_clear();

    let hits = match results {
        Ok(hits) => hits,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        Output::warning("No questions found matching your query.");
    } else {
        Output::success(&format!("Found {} questions", hits.len()));
        for (i, hit) in hits.iter().enumerate() {
            Output::search_hit(i + 1, hit);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_mode() {
        let args = SearchArgs {
            query: "space".to_string(),
            semantic: true,
            limit: Some(5),
            ..Default::default()
        };
        let request = args.request();
        assert_eq!(request.mode, SearchMode::Semantic);
        assert_eq!(request.limit, Some(5));

        let plain = SearchArgs::default().request();
        assert_eq!(plain.mode, SearchMode::Substring);
    }
}
