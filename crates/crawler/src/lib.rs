//! LibreCores Repository Crawlers
//!
//! Extracts metadata from the source repositories of projects: commit
//! history, line counts per language, README and LICENSE texts, and for
//! repositories hosted on GitHub the metadata exposed by the GitHub API.

pub mod cloc;
pub mod commit_log;
pub mod crawler;
pub mod files;
pub mod git;
pub mod github;
pub mod markup;
pub mod process;

pub use crawler::{RepoCrawler, RepoCrawlerFactory};

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("'{command}' failed with exit code {code:?}: {stderr}")]
    Process {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unable to fetch commits from {dir}: {stderr}")]
    AncestorCheck { dir: String, stderr: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No crawler for source repository of type {0} found")]
    UnsupportedRepoType(String),

    #[error("Markup conversion failed: {0}")]
    Markup(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("API error: {0}")]
    Api(String),

    #[error("Database error: {0}")]
    Database(#[from] librecores_database::DatabaseError),
}

pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Configuration for crawlers
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub github_token: Option<String>,
    pub github_api_url: String,
    /// Target of the push webhooks installed on GitHub repositories
    pub webhook_url: Option<String>,
    pub user_agent: String,
    pub git_command: String,
    pub cloc_command: String,
    pub clone_timeout: Duration,
    pub log_timeout: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            github_token: std::env::var("GITHUB_TOKEN").ok(),
            github_api_url: std::env::var("LIBRECORES_GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            webhook_url: std::env::var("LIBRECORES_WEBHOOK_URL").ok(),
            user_agent: "LibreCores/0.1 (https://www.librecores.org)".to_string(),
            git_command: std::env::var("LIBRECORES_GIT").unwrap_or_else(|_| "git".to_string()),
            cloc_command: std::env::var("LIBRECORES_CLOC").unwrap_or_else(|_| "cloc".to_string()),
            clone_timeout: Duration::from_secs(3 * 60),
            log_timeout: Duration::from_secs(60),
        }
    }
}
