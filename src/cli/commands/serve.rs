//! Serve command - start the search UI.

use crate::cli::Output;
use crate::config::Settings;
use crate::inference::ModelProbe;
use crate::orchestrator::Orchestrator;
use crate::server::{self, AppState};
use std::sync::Arc;
use std::time::Duration;

/// Run the search UI server.
pub async fn run_serve(host: Option<&str>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    let host = host.unwrap_or(&settings.server.host).to_string();
    let port = port.unwrap_or(settings.server.port);

    // Semantic mode is only offered when the reranker answers.
    let probe = ModelProbe::new(Duration::from_secs(10))?;
    let semantic = match probe
        .ensure_ready(&settings.reranker.base_url, &settings.reranker.model)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            Output::warning(&format!("Semantic search disabled: {}", e));
            false
        }
    };
    let nearest = semantic
        && match probe
            .ensure_ready(&settings.embedding.base_url, &settings.embedding.model)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                Output::warning(&format!("Reranking filtered questions instead of nearest neighbours: {}", e));
                false
            }
        };

    let embedding_model = settings.embedding.model.clone();
    let orchestrator = Orchestrator::new(settings)?;
    let engine = orchestrator.search_engine_with(semantic, nearest)?;
    let state = Arc::new(AppState::new(engine, embedding_model));

    let addr = format!("{}:{}", host, port);

    Output::header("Quizbank Search UI");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Search UI", "GET  /");
    Output::kv("Health", "GET  /health");
    Output::kv("Search", "POST /api/search");
    Output::kv("Categories", "GET  /api/categories");
    Output::kv("Stats", "GET  /api/stats");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    server::serve(&addr, state).await?;

    Ok(())
}
