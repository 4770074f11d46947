//! Database query functions

use crate::models::*;
use crate::schema::Database;
use crate::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

const PROJECT_COLUMNS: &str = "id, name, description_text, description_text_auto_update,
    license_text, license_text_auto_update, in_processing,
    datetime(created_at) as created_at, datetime(updated_at) as updated_at";

const REPO_COLUMNS: &str = "id, project_id, repo_type, url, web_view_url,
    datetime(last_crawled_at) as last_crawled_at, datetime(created_at) as created_at";

const COMMIT_COLUMNS: &str = "id, repo_id, commit_id, contributor_id, date_committed,
    files_modified, lines_added, lines_removed";

impl Database {
    // ==================== Projects ====================

    /// Get all projects
    pub async fn get_projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY name"
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Get a project by its fully-qualified name
    pub async fn get_project_by_name(&self, name: &str) -> Result<Project> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Project: {}", name)))
    }

    /// Get a project by ID
    pub async fn get_project_by_id(&self, id: i64) -> Result<Project> {
        sqlx::query_as::<_, Project>(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Project ID: {}", id)))
    }

    /// Create a new project
    pub async fn create_project(&self, project: NewProject) -> Result<Project> {
        let id = sqlx::query(
            "INSERT INTO projects (name, description_text_auto_update, license_text_auto_update)
             VALUES (?, ?, ?)",
        )
        .bind(&project.name)
        .bind(project.description_text_auto_update)
        .bind(project.license_text_auto_update)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_project_by_id(id).await
    }

    /// Store the description and license texts of a project
    pub async fn update_project_texts(&self, project: &Project) -> Result<()> {
        sqlx::query(
            "UPDATE projects
             SET description_text = ?, license_text = ?, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&project.description_text)
        .bind(&project.license_text)
        .bind(project.id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Toggle the auto-update flags of a project
    pub async fn set_project_auto_update(
        &self,
        id: i64,
        description_text_auto_update: bool,
        license_text_auto_update: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE projects
             SET description_text_auto_update = ?, license_text_auto_update = ?,
                 updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(description_text_auto_update)
        .bind(license_text_auto_update)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Mark a project as being processed by a crawl job
    pub async fn set_project_in_processing(&self, id: i64, in_processing: bool) -> Result<()> {
        sqlx::query("UPDATE projects SET in_processing = ? WHERE id = ?")
            .bind(in_processing)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // ==================== Source Repositories ====================

    /// Register a source repository
    pub async fn create_source_repo(&self, repo: NewSourceRepo) -> Result<SourceRepo> {
        let id = sqlx::query(
            "INSERT INTO source_repos (project_id, repo_type, url, web_view_url)
             VALUES (?, ?, ?, ?)",
        )
        .bind(repo.project_id)
        .bind(&repo.repo_type)
        .bind(&repo.url)
        .bind(&repo.web_view_url)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        self.get_source_repo(id).await
    }

    /// Get a source repository by ID
    pub async fn get_source_repo(&self, id: i64) -> Result<SourceRepo> {
        sqlx::query_as::<_, SourceRepo>(&format!("SELECT {REPO_COLUMNS} FROM source_repos WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Source repository ID: {}", id)))
    }

    /// Get all source repositories
    pub async fn get_source_repos(&self) -> Result<Vec<SourceRepo>> {
        let rows = sqlx::query_as::<_, SourceRepo>(&format!(
            "SELECT {REPO_COLUMNS} FROM source_repos ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Get the source repositories of a project
    pub async fn get_source_repos_for_project(&self, project_id: i64) -> Result<Vec<SourceRepo>> {
        let rows = sqlx::query_as::<_, SourceRepo>(&format!(
            "SELECT {REPO_COLUMNS} FROM source_repos WHERE project_id = ? ORDER BY id"
        ))
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Set the URL under which the repository can be browsed
    pub async fn set_web_view_url(&self, repo_id: i64, web_view_url: &str) -> Result<()> {
        sqlx::query("UPDATE source_repos SET web_view_url = ? WHERE id = ?")
            .bind(web_view_url)
            .bind(repo_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Record that a crawl of the repository completed
    pub async fn mark_repo_crawled(&self, repo_id: i64) -> Result<()> {
        sqlx::query("UPDATE source_repos SET last_crawled_at = datetime('now') WHERE id = ?")
            .bind(repo_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // ==================== Commits ====================

    /// Get the most recent commit stored for a repository
    pub async fn get_latest_commit(&self, repo_id: i64) -> Result<Option<Commit>> {
        let row = sqlx::query_as::<_, Commit>(&format!(
            "SELECT {COMMIT_COLUMNS} FROM commits
             WHERE repo_id = ?
             ORDER BY date_committed DESC, id DESC
             LIMIT 1"
        ))
        .bind(repo_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    /// Get the oldest commit stored for a repository
    pub async fn get_first_commit(&self, repo_id: i64) -> Result<Option<Commit>> {
        let row = sqlx::query_as::<_, Commit>(&format!(
            "SELECT {COMMIT_COLUMNS} FROM commits
             WHERE repo_id = ?
             ORDER BY date_committed ASC, id ASC
             LIMIT 1"
        ))
        .bind(repo_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    /// Get all commits of a repository, oldest first
    pub async fn get_commits(&self, repo_id: i64) -> Result<Vec<Commit>> {
        let rows = sqlx::query_as::<_, Commit>(&format!(
            "SELECT {COMMIT_COLUMNS} FROM commits
             WHERE repo_id = ?
             ORDER BY date_committed ASC, id ASC"
        ))
        .bind(repo_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Count the commits of a repository
    pub async fn get_commit_count(&self, repo_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM commits WHERE repo_id = ?")
            .bind(repo_id)
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    /// Get the commit dates of a repository within `[start, end]`, oldest first
    pub async fn get_commit_dates_between(
        &self,
        repo_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let dates: Vec<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT date_committed FROM commits
             WHERE repo_id = ? AND date_committed >= ? AND date_committed <= ?
             ORDER BY date_committed ASC",
        )
        .bind(repo_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;

        Ok(dates)
    }

    /// Append commits to a repository in a single transaction
    ///
    /// Commits whose id is already stored for the repository are skipped.
    /// Returns the number of commits inserted.
    pub async fn append_commits(&self, repo_id: i64, commits: &[NewCommit]) -> Result<usize> {
        let mut tx = self.pool().begin().await?;
        let inserted = insert_commits(&mut *tx, repo_id, commits).await?;
        tx.commit().await?;

        debug!(repo_id = repo_id, inserted = inserted, "Appended commits");
        Ok(inserted)
    }

    /// Replace every commit of a repository in a single transaction
    pub async fn replace_commits(&self, repo_id: i64, commits: &[NewCommit]) -> Result<usize> {
        let mut tx = self.pool().begin().await?;

        let removed = sqlx::query("DELETE FROM commits WHERE repo_id = ?")
            .bind(repo_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let inserted = insert_commits(&mut *tx, repo_id, commits).await?;

        tx.commit().await?;

        debug!(repo_id = repo_id, removed = removed, inserted = inserted, "Replaced commits");
        Ok(inserted)
    }

    // ==================== Contributors ====================

    /// Get the contributors of a repository
    pub async fn get_contributors(&self, repo_id: i64) -> Result<Vec<Contributor>> {
        let rows = sqlx::query_as::<_, Contributor>(
            "SELECT id, repo_id, name, email FROM contributors WHERE repo_id = ? ORDER BY id",
        )
        .bind(repo_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Count the contributors that authored at least one stored commit
    pub async fn get_contributor_count(&self, repo_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT contributor_id) FROM commits WHERE repo_id = ?",
        )
        .bind(repo_id)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    /// Get the contributors with the most commits
    pub async fn get_top_contributors(
        &self,
        repo_id: i64,
        limit: i64,
    ) -> Result<Vec<ContributorCommitCount>> {
        let rows = sqlx::query_as::<_, ContributorCommitCount>(
            "SELECT c.id as contributor_id, c.name, c.email, COUNT(m.id) as commits
             FROM contributors c
             INNER JOIN commits m ON m.contributor_id = c.id
             WHERE c.repo_id = ?
             GROUP BY c.id
             ORDER BY commits DESC, c.name ASC
             LIMIT ?",
        )
        .bind(repo_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    // ==================== Source Stats ====================

    /// Replace the aggregate and per-language line counts of a repository
    ///
    /// Old language rows are deleted and the new ones inserted in the same
    /// transaction as the aggregate update.
    pub async fn replace_source_stats(&self, repo_id: i64, stats: &NewSourceStats) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO source_stats
             (repo_id, available, total_files, total_lines_of_code, total_blank_lines,
              total_lines_of_comments, updated_at)
             VALUES (?, 1, ?, ?, ?, ?, datetime('now'))
             ON CONFLICT(repo_id) DO UPDATE SET
                available = 1,
                total_files = excluded.total_files,
                total_lines_of_code = excluded.total_lines_of_code,
                total_blank_lines = excluded.total_blank_lines,
                total_lines_of_comments = excluded.total_lines_of_comments,
                updated_at = excluded.updated_at",
        )
        .bind(repo_id)
        .bind(stats.total_files)
        .bind(stats.total_lines_of_code)
        .bind(stats.total_blank_lines)
        .bind(stats.total_lines_of_comments)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM language_stats WHERE repo_id = ?")
            .bind(repo_id)
            .execute(&mut *tx)
            .await?;

        for lang in &stats.languages {
            sqlx::query(
                "INSERT INTO language_stats
                 (repo_id, language, file_count, lines_of_code, comment_line_count, blank_line_count)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(repo_id)
            .bind(&lang.language)
            .bind(lang.file_count)
            .bind(lang.lines_of_code)
            .bind(lang.comment_line_count)
            .bind(lang.blank_line_count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get the aggregate line counts of a repository
    pub async fn get_source_stats(&self, repo_id: i64) -> Result<Option<SourceStats>> {
        let row = sqlx::query_as::<_, SourceStats>(
            "SELECT repo_id, available, total_files, total_lines_of_code, total_blank_lines,
                    total_lines_of_comments, datetime(updated_at) as updated_at
             FROM source_stats WHERE repo_id = ?",
        )
        .bind(repo_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }

    /// Get the per-language line counts of a repository, largest first
    pub async fn get_language_stats(&self, repo_id: i64) -> Result<Vec<LanguageStat>> {
        let rows = sqlx::query_as::<_, LanguageStat>(
            "SELECT id, repo_id, language, file_count, lines_of_code, comment_line_count,
                    blank_line_count
             FROM language_stats WHERE repo_id = ?
             ORDER BY lines_of_code DESC, language ASC",
        )
        .bind(repo_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    // ==================== GitHub Snapshots ====================

    /// Insert a new GitHub snapshot
    pub async fn insert_github_snapshot(&self, snapshot: NewGithubSnapshot) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO github_snapshots
             (repo_id, full_name, stars, forks, open_issues, watchers, default_branch)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(snapshot.repo_id)
        .bind(&snapshot.full_name)
        .bind(snapshot.stars)
        .bind(snapshot.forks)
        .bind(snapshot.open_issues)
        .bind(snapshot.watchers)
        .bind(&snapshot.default_branch)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// Get the latest GitHub snapshot of a repository
    pub async fn get_latest_github_snapshot(&self, repo_id: i64) -> Result<Option<GithubSnapshot>> {
        let row = sqlx::query_as::<_, GithubSnapshot>(
            "SELECT id, repo_id, full_name, stars, forks, open_issues, watchers, default_branch,
                    datetime(collected_at) as collected_at
             FROM github_snapshots
             WHERE repo_id = ?
             ORDER BY collected_at DESC, id DESC
             LIMIT 1",
        )
        .bind(repo_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row)
    }
}

/// Insert commits on an open connection, resolving contributors by email
async fn insert_commits(
    conn: &mut SqliteConnection,
    repo_id: i64,
    commits: &[NewCommit],
) -> Result<usize> {
    let mut inserted = 0;

    for commit in commits {
        let contributor_id = contributor_for_repository(
            &mut *conn,
            repo_id,
            &commit.author_email,
            &commit.author_name,
        )
        .await?;

        let affected = sqlx::query(
            "INSERT INTO commits
             (repo_id, commit_id, contributor_id, date_committed, files_modified,
              lines_added, lines_removed)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(repo_id, commit_id) DO NOTHING",
        )
        .bind(repo_id)
        .bind(&commit.commit_id)
        .bind(contributor_id)
        .bind(commit.date_committed)
        .bind(commit.files_modified)
        .bind(commit.lines_added)
        .bind(commit.lines_removed)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        inserted += affected as usize;
    }

    Ok(inserted)
}

/// Look up the contributor with the given email, creating it if needed
async fn contributor_for_repository(
    conn: &mut SqliteConnection,
    repo_id: i64,
    email: &str,
    name: &str,
) -> Result<i64> {
    sqlx::query(
        "INSERT INTO contributors (repo_id, name, email) VALUES (?, ?, ?)
         ON CONFLICT(repo_id, email) DO NOTHING",
    )
    .bind(repo_id)
    .bind(name)
    .bind(email)
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM contributors WHERE repo_id = ? AND email = ?")
        .bind(repo_id)
        .bind(email)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}
