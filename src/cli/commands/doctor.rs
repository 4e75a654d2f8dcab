//! Doctor command - verify the database, inference servers and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::inference::ModelProbe;
use crate::store::{QuestionStore, SqliteQuestionStore};
use console::style;
use std::path::Path;
use std::time::Duration;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("Quizbank Doctor");
    println!();
    println!("Checking database, inference servers and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("Storage").bold());
    let storage = vec![check_data_dir(settings), check_database(&settings.sqlite_path()).await];
    for check in &storage {
        check.print();
    }
    checks.extend(storage);

    println!();

    println!("{}", style("Inference").bold());
    let inference = vec![
        check_model(
            "Embedding model",
            &settings.embedding.base_url,
            &settings.embedding.model,
            "Needed by 'quizbank index'. Start a text-embeddings-inference server for this model.",
        )
        .await,
        check_model(
            "Reranker model",
            &settings.reranker.base_url,
            &settings.reranker.model,
            "Needed by semantic search. Start a text-embeddings-inference server for this model.",
        )
        .await,
    ];
    for check in &inference {
        check.print();
    }
    checks.extend(inference);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Quizbank.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Quizbank is ready to use.");
    }

    Ok(())
}

fn check_data_dir(settings: &Settings) -> CheckResult {
    let data_dir = settings.data_dir();
    if data_dir.exists() {
        CheckResult::ok("Data directory", &format!("{}", data_dir.display()))
    } else {
        CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        )
    }
}

/// Open the database read-write and count its questions.
async fn check_database(db_path: &Path) -> CheckResult {
    if !db_path.exists() {
        return CheckResult::warning(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created by 'quizbank fetch'",
        );
    }

    let size = std::fs::metadata(db_path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "unknown size".to_string());

    let count = match SqliteQuestionStore::new(db_path) {
        Ok(store) => store.count().await,
        Err(e) => Err(e),
    };

    match count {
        Ok(n) => CheckResult::ok(
            "Database",
            &format!("{} ({}, {} questions)", db_path.display(), size, n),
        ),
        Err(e) => CheckResult::error(
            "Database",
            &format!("{} unreadable: {}", db_path.display(), e),
            "Move the file aside and run 'quizbank fetch' again",
        ),
    }
}

async fn check_model(name: &str, base_url: &str, model: &str, hint: &str) -> CheckResult {
    let probe = match ModelProbe::new(Duration::from_secs(10)) {
        Ok(p) => p,
        Err(e) => return CheckResult::error(name, &e.to_string(), hint),
    };

    match probe.ensure_ready(base_url, model).await {
        Ok(info) => {
            let version = info.version.map(|v| format!(", v{}", v)).unwrap_or_default();
            CheckResult::ok(name, &format!("{} at {}{}", info.model_id, base_url, version))
        }
        Err(e) => CheckResult::warning(name, &e.to_string(), hint),
    }
}

fn check_config_file(config_path: &Path) -> CheckResult {
    if !config_path.exists() {
        return CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: quizbank config edit",
        );
    }

    match Settings::load_from(Some(&config_path.to_path_buf())) {
        Ok(_) => CheckResult::ok("Config file", &format!("{}", config_path.display())),
        Err(e) => CheckResult::error(
            "Config file",
            &format!("{} is invalid: {}", config_path.display(), e),
            "Fix with: quizbank config edit",
        ),
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_router;
    use axum::{routing::get, Json, Router};

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[tokio::test]
    async fn test_check_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.db");

        let missing = check_database(&path).await;
        assert_eq!(missing.status, CheckStatus::Warning);

        SqliteQuestionStore::new(&path).unwrap();
        let present = check_database(&path).await;
        assert_eq!(present.status, CheckStatus::Ok);
        assert!(present.message.contains("0 questions"));
    }

    #[tokio::test]
    async fn test_check_model_mismatch_is_warning() {
        let router = Router::new().route(
            "/info",
            get(|| async { Json(serde_json::json!({ "model_id": "other/model" })) }),
        );
        let base = spawn_router(router).await;

        let ok = check_model("Reranker", &base, "other/model", "hint").await;
        assert_eq!(ok.status, CheckStatus::Ok);

        let mismatch = check_model("Reranker", &base, "BAAI/bge-reranker-v2-m3", "hint").await;
        assert_eq!(mismatch.status, CheckStatus::Warning);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ingest]\npage_sizes = []\n").unwrap();

        assert_eq!(check_config_file(&path).status, CheckStatus::Error);
        assert_eq!(
            check_config_file(&dir.path().join("absent.toml")).status,
            CheckStatus::Warning
        );
    }
}
