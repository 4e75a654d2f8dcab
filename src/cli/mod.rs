//! CLI module for Quizbank.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Quizbank - trivia question bank with semantic search
///
/// Fetches trivia questions from public APIs into a local SQLite database and
/// searches them by substring or by relevance to a theme.
#[derive(Parser, Debug)]
#[command(name = "quizbank")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch questions from the upstream trivia APIs
    Fetch {
        /// Only fetch from one source (opentdb, the-trivia-api, all)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Compute embeddings for questions that have none yet
    Index {
        /// Texts per embedding request (defaults to embedding.batch_size)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Search the question bank
    Search {
        /// Substring to match, or theme to rank by with --semantic
        query: String,

        /// Rank by relevance with the reranker model
        #[arg(short, long)]
        semantic: bool,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only questions from this category
        #[arg(long)]
        category: Option<String>,

        /// Only questions of this difficulty (easy, medium, hard)
        #[arg(long)]
        difficulty: Option<String>,

        /// Minimum relevance score (0.0-1.0, semantic only)
        #[arg(short, long)]
        min_score: Option<f32>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show question counts by source and category
    Stats,

    /// Start the search UI
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check database, inference servers and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_flags() {
        let cli = Cli::try_parse_from([
            "quizbank", "-vv", "search", "harry potter", "--semantic", "-l", "3", "--category", "Books",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Search { query, semantic, limit, category, .. } => {
                assert_eq!(query, "harry potter");
                assert!(semantic);
                assert_eq!(limit, Some(3));
                assert_eq!(category.as_deref(), Some("Books"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_fetch_source() {
        let cli = Cli::try_parse_from(["quizbank", "fetch", "--source", "opentdb"]).unwrap();
        assert!(matches!(cli.command, Commands::Fetch { source: Some(ref s) } if s == "opentdb"));
    }

    #[test]
    fn test_parse_config_action() {
        let cli = Cli::try_parse_from(["quizbank", "--config", "/tmp/q.toml", "config", "path"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/q.toml"));
        assert!(matches!(cli.command, Commands::Config { action: ConfigAction::Path }));
    }
}
