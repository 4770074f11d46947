//! Database models for LibreCores

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An open-hardware project listed on LibreCores
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description_text: Option<String>,
    pub description_text_auto_update: bool,
    pub license_text: Option<String>,
    pub license_text_auto_update: bool,
    pub in_processing: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new project
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description_text_auto_update: bool,
    pub license_text_auto_update: bool,
}

/// Reference to a project's version-controlled origin
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SourceRepo {
    pub id: i64,
    pub project_id: Option<i64>,
    pub repo_type: String,
    pub url: String,
    pub web_view_url: Option<String>,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Repository type tag of git repositories
pub const REPO_TYPE_GIT: &str = "git";

/// Input for registering a source repository
#[derive(Debug, Clone, Deserialize)]
pub struct NewSourceRepo {
    pub project_id: Option<i64>,
    pub repo_type: String,
    pub url: String,
    pub web_view_url: Option<String>,
}

/// A commit author, unique by email within one repository
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contributor {
    pub id: i64,
    pub repo_id: i64,
    pub name: String,
    pub email: String,
}

/// A commit of a source repository
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Commit {
    pub id: i64,
    pub repo_id: i64,
    pub commit_id: String,
    pub contributor_id: i64,
    pub date_committed: DateTime<Utc>,
    pub files_modified: i64,
    pub lines_added: Option<i64>,
    pub lines_removed: Option<i64>,
}

/// Input for storing a commit; the contributor is resolved by email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub commit_id: String,
    pub author_name: String,
    pub author_email: String,
    pub date_committed: DateTime<Utc>,
    pub files_modified: i64,
    pub lines_added: Option<i64>,
    pub lines_removed: Option<i64>,
}

/// Aggregate line counts of a repository
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SourceStats {
    pub repo_id: i64,
    pub available: bool,
    pub total_files: i64,
    pub total_lines_of_code: i64,
    pub total_blank_lines: i64,
    pub total_lines_of_comments: i64,
    pub updated_at: DateTime<Utc>,
}

/// Line counts of one language in a repository
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LanguageStat {
    pub id: i64,
    pub repo_id: i64,
    pub language: String,
    pub file_count: i64,
    pub lines_of_code: i64,
    pub comment_line_count: i64,
    pub blank_line_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLanguageStat {
    pub language: String,
    pub file_count: i64,
    pub lines_of_code: i64,
    pub comment_line_count: i64,
    pub blank_line_count: i64,
}

/// Input for replacing the line counts of a repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSourceStats {
    pub total_files: i64,
    pub total_lines_of_code: i64,
    pub total_blank_lines: i64,
    pub total_lines_of_comments: i64,
    pub languages: Vec<NewLanguageStat>,
}

/// GitHub repository metadata snapshot
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GithubSnapshot {
    pub id: i64,
    pub repo_id: i64,
    pub full_name: String,
    pub stars: i64,
    pub forks: i64,
    pub open_issues: i64,
    pub watchers: i64,
    pub default_branch: Option<String>,
    pub collected_at: DateTime<Utc>,
}

/// Input for creating a GitHub snapshot
#[derive(Debug, Clone)]
pub struct NewGithubSnapshot {
    pub repo_id: i64,
    pub full_name: String,
    pub stars: i64,
    pub forks: i64,
    pub open_issues: i64,
    pub watchers: i64,
    pub default_branch: Option<String>,
}

/// Number of commits authored by one contributor
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContributorCommitCount {
    pub contributor_id: i64,
    pub name: String,
    pub email: String,
    pub commits: i64,
}
