//! Crawler selection and dispatch

use crate::git::GitRepoCrawler;
use crate::github::{GithubClient, GithubRepoCrawler, GithubRepoUrl};
use crate::markup::{HtmlMarkupConverter, MarkupConverter};
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::{CrawlerConfig, CrawlerError, Result};
use librecores_database::{Database, SourceRepo, REPO_TYPE_GIT};
use std::sync::Arc;
use tracing::debug;

/// A crawler for one source repository
pub enum RepoCrawler {
    Git(GitRepoCrawler),
    Github(GithubRepoCrawler),
}

impl RepoCrawler {
    /// Whether the source repository is of a kind this crawler can handle
    pub fn is_valid_repo_type(&self) -> bool {
        self.git().is_valid_repo_type()
    }

    /// Fetch commits, line counts and host metadata of the repository
    ///
    /// Returns the number of commits stored.
    pub async fn update_source_repo(&self) -> Result<usize> {
        match self {
            RepoCrawler::Git(crawler) => crawler.update_source_repo().await,
            RepoCrawler::Github(crawler) => crawler.update_source_repo().await,
        }
    }

    /// Refresh the texts of the associated project from the repository
    ///
    /// Returns `false` when the repository belongs to no project.
    pub async fn update_project(&self) -> Result<bool> {
        match self {
            RepoCrawler::Git(crawler) => crawler.update_project().await,
            RepoCrawler::Github(crawler) => crawler.update_project().await,
        }
    }

    pub fn repo(&self) -> &SourceRepo {
        self.git().repo()
    }

    fn git(&self) -> &GitRepoCrawler {
        match self {
            RepoCrawler::Git(crawler) => crawler,
            RepoCrawler::Github(crawler) => crawler.git(),
        }
    }
}

/// Creates the appropriate crawler for a source repository
#[derive(Clone)]
pub struct RepoCrawlerFactory {
    db: Database,
    runner: Arc<dyn ProcessRunner>,
    markup: Arc<dyn MarkupConverter>,
    github: GithubClient,
    config: Arc<CrawlerConfig>,
}

impl RepoCrawlerFactory {
    pub fn new(
        db: Database,
        runner: Arc<dyn ProcessRunner>,
        markup: Arc<dyn MarkupConverter>,
        config: CrawlerConfig,
    ) -> Result<Self> {
        let github = GithubClient::new(&config)?;
        Ok(Self {
            db,
            runner,
            markup,
            github,
            config: Arc::new(config),
        })
    }

    /// Factory running real `git` and `cloc` processes
    pub fn with_system_tools(db: Database, config: CrawlerConfig) -> Result<Self> {
        Self::new(
            db,
            Arc::new(SystemProcessRunner),
            Arc::new(HtmlMarkupConverter),
            config,
        )
    }

    /// Get a crawler for the source repository
    ///
    /// Git repositories hosted on GitHub get the GitHub crawler, all other
    /// git repositories the plain git crawler.
    pub fn crawler_for(&self, repo: SourceRepo) -> Result<RepoCrawler> {
        if repo.repo_type != REPO_TYPE_GIT {
            return Err(CrawlerError::UnsupportedRepoType(repo.repo_type));
        }

        let location = GithubRepoUrl::parse(&repo.url);
        let git = GitRepoCrawler::new(
            repo,
            self.db.clone(),
            Arc::clone(&self.runner),
            Arc::clone(&self.markup),
            Arc::clone(&self.config),
        );

        match location {
            Some(location) => {
                debug!(repo = %location.full_name(), "Using GitHub crawler");
                Ok(RepoCrawler::Github(GithubRepoCrawler::new(
                    git,
                    self.github.clone(),
                    location,
                    Arc::clone(&self.config),
                )))
            }
            None => Ok(RepoCrawler::Git(git)),
        }
    }
}
