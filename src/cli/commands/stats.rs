//! Stats command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::store::QuestionStore;
use anyhow::Result;

/// Run the stats command.
pub async fn run_stats(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let store = orchestrator.store();

    let total = store.count().await?;
    if total == 0 {
        Output::info("No questions yet. Use 'quizbank fetch' to download some.");
        return Ok(());
    }

    Output::header(&format!("Questions ({})", total));
    for source in store.count_by_source().await? {
        Output::kv(&source.source, &source.count.to_string());
    }

    let categories = store.categories().await?;
    Output::header(&format!("Categories ({})", categories.len()));
    for category in &categories {
        Output::kv(&category.category, &category.count.to_string());
    }

    let model = &orchestrator.settings().embedding.model;
    let embedded = store.embedding_count(model).await?;
    println!();
    Output::kv("Embedded", &format!("{}/{} ({})", embedded, total, model));

    Ok(())
}
