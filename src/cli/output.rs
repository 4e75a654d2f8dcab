//! CLI output formatting utilities.

use crate::ingest::{CategoryReport, CategoryStatus};
use crate::search::SearchHit;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print one category line of an ingestion report.
    pub fn category_report(report: &CategoryReport) {
        let status = match &report.status {
            CategoryStatus::Completed => style("done".to_string()).green(),
            CategoryStatus::Aborted(reason) => style(format!("stopped: {}", reason)).yellow(),
            CategoryStatus::Failed(reason) => style(format!("failed: {}", reason)).red(),
        };
        println!(
            "  {} {} +{} new, {} duplicates, {} requests ({})",
            style("*").cyan(),
            style(&report.category).bold(),
            report.inserted,
            report.duplicates,
            report.requests,
            status
        );
    }

    /// Print a search hit.
    pub fn search_hit(rank: usize, hit: &SearchHit) {
        let q = &hit.question;
        let score = hit
            .score
            .map(|s| format!(" (score: {:.3})", s))
            .unwrap_or_default();

        println!(
            "\n{} {}{}",
            style(format!("{:>3}.", rank)).green(),
            style(&q.question).bold(),
            style(score).cyan()
        );
        println!("     {} {}", style("answer:").dim(), q.correct_answer);
        if !q.incorrect_answers.is_empty() {
            println!("     {} {}", style("others:").dim(), q.incorrect_answers.join(" | "));
        }
        println!(
            "     {}",
            style(format!("{} / {} / {}", q.category, q.difficulty, q.source)).dim()
        );
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}
