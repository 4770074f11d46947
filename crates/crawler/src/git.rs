//! Crawler for generic git repositories
//!
//! The repository is cloned into a temporary directory and inspected with
//! ordinary `git` commands and `cloc`.

use crate::cloc;
use crate::commit_log::{self, LOG_FORMAT};
use crate::files::{self, FILES_DESCRIPTION, FILES_LICENSE, FILE_EXTENSIONS};
use crate::markup::MarkupConverter;
use crate::process::{ensure_success, ProcessOutput, ProcessRunner, ProcessSpec};
use crate::{CrawlerConfig, CrawlerError, Result};
use librecores_database::{Database, NewCommit, NewSourceStats, SourceRepo, REPO_TYPE_GIT};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

/// Prefix of the temporary directories holding clones
const CLONE_DIR_PREFIX: &str = "lc-gitrepocrawler-";

/// Whether a stored commit is still part of the remote's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ancestry {
    /// The commit is an ancestor of `HEAD`; history is intact
    Ancestor,
    /// The commit is unknown or not reachable from `HEAD`; history was rewritten
    NotAncestor,
}

impl Ancestry {
    /// Interpret the exit code of `git merge-base --is-ancestor`
    ///
    /// 0 means ancestor; 1 (not an ancestor) and 128 (unknown revision) both
    /// mean the commit was pruned. Anything else is not a verdict.
    pub fn from_exit_code(code: Option<i32>) -> Option<Self> {
        match code {
            Some(0) => Some(Ancestry::Ancestor),
            Some(1) | Some(128) => Some(Ancestry::NotAncestor),
            _ => None,
        }
    }
}

/// Crawls a git repository through a local clone
pub struct GitRepoCrawler {
    repo: SourceRepo,
    db: Database,
    runner: Arc<dyn ProcessRunner>,
    markup: Arc<dyn MarkupConverter>,
    config: Arc<CrawlerConfig>,
    clone_dir: OnceCell<TempDir>,
}

impl GitRepoCrawler {
    pub fn new(
        repo: SourceRepo,
        db: Database,
        runner: Arc<dyn ProcessRunner>,
        markup: Arc<dyn MarkupConverter>,
        config: Arc<CrawlerConfig>,
    ) -> Self {
        Self {
            repo,
            db,
            runner,
            markup,
            config,
            clone_dir: OnceCell::new(),
        }
    }

    pub fn repo(&self) -> &SourceRepo {
        &self.repo
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn is_valid_repo_type(&self) -> bool {
        self.repo.repo_type == REPO_TYPE_GIT
    }

    /// Ingest new commits and refresh line counts
    ///
    /// Appends the commits made since the latest stored one. When that commit
    /// is no longer part of the history, all stored commits are replaced by
    /// the full history. Returns the number of commits stored.
    pub async fn update_source_repo(&self) -> Result<usize> {
        info!(repo_id = self.repo.id, url = %self.repo.url, "Fetching commits for repository");

        let latest = self.db.get_latest_commit(self.repo.id).await?;

        let stored = match latest {
            Some(ref commit) => match self.commit_ancestry(&commit.commit_id).await? {
                Ancestry::Ancestor => {
                    let commits = self.fetch_commits(Some(&commit.commit_id)).await?;
                    self.db.append_commits(self.repo.id, &commits).await?
                }
                Ancestry::NotAncestor => {
                    info!(
                        repo_id = self.repo.id,
                        commit = %commit.commit_id,
                        "History rewritten, replacing all commits"
                    );
                    let commits = self.fetch_commits(None).await?;
                    self.db.replace_commits(self.repo.id, &commits).await?
                }
            },
            None => {
                let commits = self.fetch_commits(None).await?;
                self.db.replace_commits(self.repo.id, &commits).await?
            }
        };

        if stored > 0 {
            self.count_lines_of_code().await?;
        }

        self.db.mark_repo_crawled(self.repo.id).await?;

        info!(repo_id = self.repo.id, commits = stored, "Updated source repository");
        Ok(stored)
    }

    /// Refresh the description and license texts of the associated project
    ///
    /// Only texts whose auto-update flag is set are touched. Returns `false`
    /// when the repository belongs to no project.
    pub async fn update_project(&self) -> Result<bool> {
        let Some(project_id) = self.repo.project_id else {
            debug!(repo_id = self.repo.id, "No project associated with source repository");
            return Ok(false);
        };

        let mut project = self.db.get_project_by_id(project_id).await?;

        if project.description_text_auto_update {
            project.description_text = self.description_safe_html().await?;
        }
        if project.license_text_auto_update {
            project.license_text = self.license_text_safe_html().await?;
        }

        self.db.update_project_texts(&project).await?;
        Ok(true)
    }

    /// Path of the local clone, cloning the repository on first use
    pub async fn clone_path(&self) -> Result<&Path> {
        let dir = self
            .clone_dir
            .get_or_try_init(|| self.clone_repo())
            .await?;
        Ok(dir.path())
    }

    /// Check whether `commit_id` is still reachable from `HEAD`
    pub async fn commit_ancestry(&self, commit_id: &str) -> Result<Ancestry> {
        let cwd = self.clone_path().await?;
        info!(dir = %cwd.display(), commit = commit_id, "Checking commits");

        let spec = ProcessSpec::new(
            self.config.git_command.as_str(),
            ["merge-base", "--is-ancestor", commit_id, "HEAD"],
        )
        .current_dir(cwd);
        let output = self.execute(&spec).await?;

        Ancestry::from_exit_code(output.code).ok_or_else(|| CrawlerError::AncestorCheck {
            dir: cwd.display().to_string(),
            stderr: output.stderr.trim().to_string(),
        })
    }

    /// Count lines of code with cloc and replace the stored statistics
    pub async fn count_lines_of_code(&self) -> Result<NewSourceStats> {
        let cwd = self.clone_path().await?;

        let spec = ProcessSpec::new(
            self.config.cloc_command.as_str(),
            [
                "--json".to_string(),
                "--skip-uniqueness".to_string(),
                cwd.display().to_string(),
            ],
        )
        .current_dir(cwd);
        let output = self.must_execute(&spec).await?;

        let stats = cloc::parse_report(&output.stdout)?;
        self.db.replace_source_stats(self.repo.id, &stats).await?;

        debug!(
            repo_id = self.repo.id,
            files = stats.total_files,
            languages = stats.languages.len(),
            "Counted lines of code"
        );
        Ok(stats)
    }

    /// Description of the repository as sanitized HTML, usually the README
    pub async fn description_safe_html(&self) -> Result<Option<String>> {
        let dir = self.clone_path().await?;
        let Some(file) = files::find_file(dir, FILES_DESCRIPTION, FILE_EXTENSIONS)? else {
            debug!("No description file found in the repository");
            return Ok(None);
        };

        debug!(file = %file.display(), "Using file as description");
        Ok(self.convert(&file))
    }

    /// License text of the repository as sanitized HTML
    pub async fn license_text_safe_html(&self) -> Result<Option<String>> {
        let dir = self.clone_path().await?;
        let Some(file) = files::find_file(dir, FILES_LICENSE, FILE_EXTENSIONS)? else {
            debug!("Found no file containing the license text");
            return Ok(None);
        };

        debug!(file = %file.display(), "Using file as license text");
        Ok(self.convert(&file))
    }

    fn convert(&self, file: &Path) -> Option<String> {
        match self.markup.convert_file(file) {
            Ok(html) => Some(html),
            Err(e) => {
                error!(file = %file.display(), error = %e, "Unable to convert file to HTML");
                None
            }
        }
    }

    async fn fetch_commits(&self, since_commit_id: Option<&str>) -> Result<Vec<NewCommit>> {
        let cwd = self.clone_path().await?;

        let mut args = vec![
            "log".to_string(),
            "--reverse".to_string(),
            LOG_FORMAT.to_string(),
            "--shortstat".to_string(),
        ];
        if let Some(commit_id) = since_commit_id {
            args.push(format!("{}...", commit_id));
        }

        info!(dir = %cwd.display(), "Fetching commits");
        let spec = ProcessSpec::new(self.config.git_command.as_str(), args)
            .current_dir(cwd)
            .timeout(self.config.log_timeout);
        let output = self.must_execute(&spec).await?;

        let commits = commit_log::parse_commits(&output.stdout)?;
        debug!(dir = %cwd.display(), count = commits.len(), "Parsed commits");
        Ok(commits)
    }

    async fn clone_repo(&self) -> Result<TempDir> {
        let dir = tempfile::Builder::new().prefix(CLONE_DIR_PREFIX).tempdir()?;

        info!(url = %self.repo.url, "Cloning repository");
        let spec = ProcessSpec::new(
            self.config.git_command.as_str(),
            [
                "clone".to_string(),
                self.repo.url.clone(),
                dir.path().display().to_string(),
            ],
        )
        .timeout(self.config.clone_timeout);
        self.must_execute(&spec).await?;

        debug!(url = %self.repo.url, dir = %dir.path().display(), "Cloned repository");
        Ok(dir)
    }

    async fn execute(&self, spec: &ProcessSpec) -> Result<ProcessOutput> {
        debug!(command = %spec.command_line(), cwd = ?spec.cwd, "Executing");
        let output = self.runner.run(spec).await?;
        debug!(code = ?output.code, "Process exited");
        Ok(output)
    }

    async fn must_execute(&self, spec: &ProcessSpec) -> Result<ProcessOutput> {
        let output = self.execute(spec).await?;
        ensure_success(spec, output)
    }
}

impl Drop for GitRepoCrawler {
    fn drop(&mut self) {
        if let Some(dir) = self.clone_dir.get() {
            debug!(dir = %dir.path().display(), "Cleaning up repo clone directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ancestry_exit_codes() {
        assert_eq!(Ancestry::from_exit_code(Some(0)), Some(Ancestry::Ancestor));
        assert_eq!(Ancestry::from_exit_code(Some(1)), Some(Ancestry::NotAncestor));
        assert_eq!(Ancestry::from_exit_code(Some(128)), Some(Ancestry::NotAncestor));
        assert_eq!(Ancestry::from_exit_code(Some(137)), None);
        assert_eq!(Ancestry::from_exit_code(None), None);
    }
}
