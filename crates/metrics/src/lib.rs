//! LibreCores Project Metrics
//!
//! Derives activity and code metrics of source repositories from the
//! commits and line counts stored by the crawlers.

pub mod histogram;

pub use histogram::{commit_histogram, Bucket, HistogramEntry};

use chrono::{DateTime, Utc};
use librecores_database::{ContributorCommitCount, Database, LanguageStat};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Database error: {0}")]
    Database(#[from] librecores_database::DatabaseError),

    #[error("Invalid range: {start} is after {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Unknown histogram bucket: {0}")]
    UnknownBucket(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;

/// Number of contributors listed in a summary
pub const TOP_CONTRIBUTORS: i64 = 5;

/// Share of one language in the code of a repository
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageShare {
    pub language: String,
    pub files: i64,
    pub lines_of_code: i64,
    /// Percentage of all lines of code, 0 to 100
    pub share: f64,
}

/// Summary of a source repository's metrics
#[derive(Debug, Clone, Serialize)]
pub struct RepoMetrics {
    pub repo_id: i64,
    pub commit_count: i64,
    pub contributor_count: i64,
    pub first_commit: Option<DateTime<Utc>>,
    pub last_commit: Option<DateTime<Utc>>,
    pub top_contributors: Vec<ContributorCommitCount>,
    pub lines_of_code: i64,
    pub languages: Vec<LanguageShare>,
}

/// Collect the metrics of a source repository
pub async fn summarize(db: &Database, repo_id: i64) -> Result<RepoMetrics> {
    let commit_count = db.get_commit_count(repo_id).await?;
    let contributor_count = db.get_contributor_count(repo_id).await?;
    let first_commit = db.get_first_commit(repo_id).await?.map(|c| c.date_committed);
    let last_commit = db.get_latest_commit(repo_id).await?.map(|c| c.date_committed);
    let top_contributors = db.get_top_contributors(repo_id, TOP_CONTRIBUTORS).await?;

    let lines_of_code = db
        .get_source_stats(repo_id)
        .await?
        .map(|s| s.total_lines_of_code)
        .unwrap_or(0);
    let languages = language_shares(&db.get_language_stats(repo_id).await?);

    debug!(
        repo_id = repo_id,
        commits = commit_count,
        contributors = contributor_count,
        "Summarized repository metrics"
    );

    Ok(RepoMetrics {
        repo_id,
        commit_count,
        contributor_count,
        first_commit,
        last_commit,
        top_contributors,
        lines_of_code,
        languages,
    })
}

/// Share of each language in the lines of code, largest first
pub fn language_shares(stats: &[LanguageStat]) -> Vec<LanguageShare> {
    let total: i64 = stats.iter().map(|s| s.lines_of_code).sum();

    let mut shares: Vec<LanguageShare> = stats
        .iter()
        .map(|s| LanguageShare {
            language: s.language.clone(),
            files: s.file_count,
            lines_of_code: s.lines_of_code,
            share: if total > 0 {
                s.lines_of_code as f64 * 100.0 / total as f64
            } else {
                0.0
            },
        })
        .collect();

    shares.sort_by(|a, b| {
        b.lines_of_code
            .cmp(&a.lines_of_code)
            .then_with(|| a.language.cmp(&b.language))
    });
    shares
}
