//! Index command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::inference::ModelProbe;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::time::Duration;

/// Run the index command.
pub async fn run_index(batch_size: Option<usize>, mut settings: Settings) -> Result<()> {
    if let Some(size) = batch_size {
        if size == 0 {
            anyhow::bail!("--batch-size must be positive");
        }
        settings.embedding.batch_size = size;
    }

    let spinner = Output::spinner("Checking embedding server...");
    let probe = ModelProbe::new(Duration::from_secs(settings.embedding.timeout_secs))?;
    let ready = probe
        .ensure_ready(&settings.embedding.base_url, &settings.embedding.model)
        .await;
    spinner.finish_and_clear();
    if let Err(e) = ready {
        Output::error(&e.to_string());
        Output::info("Start the embedding server or adjust [embedding] in the config.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let pb = Output::progress_bar(0, "Embedding questions");
    let result = orchestrator.index_embeddings(Some(pb.clone())).await;
    pb.finish_and_clear();
    let result = result?;

    if result.embedded == 0 {
        Output::info("Every question already has an embedding.");
    } else {
        Output::success(&format!(
            "Embedded {} questions in {} batches",
            result.embedded, result.batches
        ));
    }

    Ok(())
}
