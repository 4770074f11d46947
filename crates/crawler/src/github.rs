//! GitHub API client and crawler for repositories hosted on GitHub

use crate::git::GitRepoCrawler;
use crate::{CrawlerConfig, CrawlerError, Result};
use chrono::Utc;
use librecores_database::NewGithubSnapshot;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

static GITHUB_REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:https?|git)://github\.com/|git@github\.com:)([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?$",
    )
    .expect("invalid regex")
});

/// Owner and name of a repository on GitHub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubRepoUrl {
    pub owner: String,
    pub name: String,
}

impl GithubRepoUrl {
    /// Extract owner and repository name from a GitHub clone URL
    pub fn parse(url: &str) -> Option<Self> {
        let captures = GITHUB_REPO_URL.captures(url.trim())?;
        Some(Self {
            owner: captures[1].to_string(),
            name: captures[2].to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn web_view_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

/// Whether the URL points to a repository hosted on GitHub
pub fn is_github_repo_url(url: &str) -> bool {
    GithubRepoUrl::parse(url).is_some()
}

/// GitHub API client
#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
pub struct RepoResponse {
    pub full_name: String,
    pub html_url: Option<String>,
    pub stargazers_count: i64,
    pub forks_count: i64,
    pub open_issues_count: i64,
    #[serde(default)]
    pub subscribers_count: i64,
    pub default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HookResponse {
    #[allow(dead_code)]
    id: i64,
    #[serde(default)]
    config: HookConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct HookConfig {
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewHook<'a> {
    name: &'a str,
    active: bool,
    events: &'a [&'a str],
    config: HookConfig,
}

impl GithubClient {
    /// Create a new GitHub client
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| CrawlerError::Api("invalid user agent".to_string()))?,
        );

        if let Some(ref token) = config.github_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| CrawlerError::Api("invalid GitHub token".to_string()))?,
            );
        }

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the metadata of a repository
    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<RepoResponse> {
        let url = format!("{}/repos/{}/{}", self.api_url, owner, repo);

        let response = self.client.get(&url).send().await?;
        self.check_rate_limit(&response)?;

        if !response.status().is_success() {
            return Err(CrawlerError::Api(format!(
                "GitHub API error: {}",
                response.status()
            )));
        }

        let repo: RepoResponse = response.json().await?;
        Ok(repo)
    }

    /// Install a push webhook unless one already targets `hook_url`
    ///
    /// Returns whether a new webhook was created.
    pub async fn ensure_push_webhook(&self, owner: &str, repo: &str, hook_url: &str) -> Result<bool> {
        let url = format!("{}/repos/{}/{}/hooks", self.api_url, owner, repo);

        let response = self.client.get(&url).send().await?;
        self.check_rate_limit(&response)?;

        if !response.status().is_success() {
            return Err(CrawlerError::Api(format!(
                "GitHub API error listing hooks: {}",
                response.status()
            )));
        }

        let hooks: Vec<HookResponse> = response.json().await?;
        if hooks
            .iter()
            .any(|hook| hook.config.url.as_deref() == Some(hook_url))
        {
            debug!(owner = owner, repo = repo, "Webhook already installed");
            return Ok(false);
        }

        let hook = NewHook {
            name: "web",
            active: true,
            events: &["push"],
            config: HookConfig {
                url: Some(hook_url.to_string()),
                content_type: Some("json".to_string()),
            },
        };

        let response = self.client.post(&url).json(&hook).send().await?;
        self.check_rate_limit(&response)?;

        if !response.status().is_success() {
            return Err(CrawlerError::Api(format!(
                "GitHub API error creating hook: {}",
                response.status()
            )));
        }

        info!(owner = owner, repo = repo, "Installed push webhook");
        Ok(true)
    }

    fn check_rate_limit(&self, response: &reqwest::Response) -> Result<()> {
        if response.status() == reqwest::StatusCode::FORBIDDEN {
            if let Some(remaining) = response.headers().get("x-ratelimit-remaining") {
                if remaining == "0" {
                    let reset = response
                        .headers()
                        .get("x-ratelimit-reset")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(60);

                    let now = Utc::now().timestamp() as u64;
                    let wait = reset.saturating_sub(now);

                    return Err(CrawlerError::RateLimited(wait));
                }
            }
        }
        Ok(())
    }
}

/// Crawler for git repositories hosted on GitHub
///
/// Performs everything the git crawler does, then records GitHub metadata
/// and installs the push webhook. GitHub failures are logged and do not fail
/// the crawl.
pub struct GithubRepoCrawler {
    git: GitRepoCrawler,
    client: GithubClient,
    location: GithubRepoUrl,
    config: Arc<CrawlerConfig>,
}

impl GithubRepoCrawler {
    pub fn new(
        git: GitRepoCrawler,
        client: GithubClient,
        location: GithubRepoUrl,
        config: Arc<CrawlerConfig>,
    ) -> Self {
        Self {
            git,
            client,
            location,
            config,
        }
    }

    pub fn git(&self) -> &GitRepoCrawler {
        &self.git
    }

    pub async fn update_source_repo(&self) -> Result<usize> {
        let stored = self.git.update_source_repo().await?;

        if let Err(e) = self.update_github_metadata().await {
            warn!(repo = %self.location.full_name(), error = %e, "Failed to fetch GitHub metadata");
        }
        if let Err(e) = self.install_webhook().await {
            warn!(repo = %self.location.full_name(), error = %e, "Failed to install GitHub webhook");
        }

        Ok(stored)
    }

    pub async fn update_project(&self) -> Result<bool> {
        self.git.update_project().await
    }

    /// Store a snapshot of the repository's GitHub metadata
    pub async fn update_github_metadata(&self) -> Result<i64> {
        let repo = self.git.repo();
        let db = self.git.database();
        let info = self
            .client
            .get_repo(&self.location.owner, &self.location.name)
            .await?;

        if repo.web_view_url.is_none() {
            let web_view_url = info
                .html_url
                .clone()
                .unwrap_or_else(|| self.location.web_view_url());
            db.set_web_view_url(repo.id, &web_view_url).await?;
        }

        let snapshot = NewGithubSnapshot {
            repo_id: repo.id,
            full_name: info.full_name,
            stars: info.stargazers_count,
            forks: info.forks_count,
            open_issues: info.open_issues_count,
            watchers: info.subscribers_count,
            default_branch: info.default_branch,
        };

        let id = db.insert_github_snapshot(snapshot).await?;
        debug!(repo = %self.location.full_name(), "Stored GitHub snapshot");
        Ok(id)
    }

    /// Install the push webhook when a token and a webhook URL are configured
    pub async fn install_webhook(&self) -> Result<bool> {
        let (Some(_), Some(hook_url)) = (&self.config.github_token, &self.config.webhook_url) else {
            debug!(repo = %self.location.full_name(), "Webhook installation not configured");
            return Ok(false);
        };

        self.client
            .ensure_push_webhook(&self.location.owner, &self.location.name, hook_url)
            .await
    }
}
