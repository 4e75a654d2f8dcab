//! Fetch command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::sources::SourceKind;
use crate::store::QuestionStore;
use anyhow::Result;

/// Parse the `--source` flag. `all` and no flag mean every enabled source.
fn parse_source(source: Option<&str>) -> Result<Option<SourceKind>> {
    match source {
        None => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
        Some(s) => s.parse::<SourceKind>().map(Some).map_err(anyhow::Error::msg),
    }
}

/// Run the fetch command.
pub async fn run_fetch(source: Option<&str>, settings: Settings) -> Result<()> {
    let only = parse_source(source)?;
    let orchestrator = Orchestrator::new(settings)?;

    let before = orchestrator.store().count().await?;
    let pb = Output::progress_bar(0, "Fetching categories");
    let reports = orchestrator.ingest(only, Some(pb.clone())).await;
    pb.finish_and_clear();
    let reports = reports?;

    if reports.is_empty() {
        Output::warning("No sources were fetched. Check [sources] in the config.");
        return Ok(());
    }

    for report in &reports {
        Output::header(&report.source);
        for category in &report.categories {
            Output::category_report(category);
        }
        let elapsed = report.finished_at - report.started_at;
        println!();
        Output::kv("New questions", &report.inserted().to_string());
        Output::kv("Duplicates", &report.duplicates().to_string());
        Output::kv("Elapsed", &format!("{}s", elapsed.num_seconds()));
        if report.failed() > 0 {
            Output::warning(&format!("{} categories did not complete", report.failed()));
        }
    }

    let after = orchestrator.store().count().await?;
    println!();
    Output::success(&format!(
        "Question bank holds {} questions (+{})",
        after,
        after.saturating_sub(before)
    ));

    Ok(())
}
