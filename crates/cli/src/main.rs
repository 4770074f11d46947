//! LibreCores CLI
//!
//! Admin tool for registering projects and crawling their repositories.

use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use librecores_crawler::{CrawlerConfig, RepoCrawlerFactory};
use librecores_database::{Database, NewProject, NewSourceRepo, SourceRepo, REPO_TYPE_GIT};
use librecores_metrics::{commit_histogram, summarize, Bucket};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "lc")]
#[command(about = "LibreCores - crawl source repositories of open hardware projects")]
#[command(version)]
struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "librecores.db")]
    database: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a project
    AddProject {
        /// Project name, e.g. "openrisc/mor1kx"
        name: String,

        /// Keep the description when crawling
        #[arg(long)]
        no_description_auto_update: bool,

        /// Keep the license text when crawling
        #[arg(long)]
        no_license_auto_update: bool,
    },

    /// Register a source repository
    AddRepo {
        /// Clone URL
        url: String,

        /// Project the repository belongs to
        #[arg(short, long)]
        project: Option<String>,

        /// Repository type
        #[arg(long = "type", default_value = REPO_TYPE_GIT)]
        repo_type: String,
    },

    /// Crawl source repositories
    Crawl {
        /// Repository id (or "all" for all repositories)
        #[arg(default_value = "all")]
        repo: String,
    },

    /// List projects and their repositories
    List,

    /// Show metrics of a project
    Status {
        /// Project name
        project: String,
    },

    /// Show a commit histogram of a project
    Histogram {
        /// Project name
        project: String,

        /// Bucket width: day, week, month or year
        #[arg(short, long, default_value = "month")]
        bucket: Bucket,

        /// Number of days to look back
        #[arg(long, default_value_t = 365)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    FmtSubscriber::builder()
        .with_env_filter(log_filter(cli.verbose, directives.as_deref()))
        .with_target(false)
        .compact()
        .init();

    let db = Database::connect(&cli.database).await?;

    match cli.command {
        Commands::AddProject {
            name,
            no_description_auto_update,
            no_license_auto_update,
        } => {
            add_project(&db, name, !no_description_auto_update, !no_license_auto_update).await?;
        }
        Commands::AddRepo {
            url,
            project,
            repo_type,
        } => {
            add_repo(&db, url, project.as_deref(), repo_type).await?;
        }
        Commands::Crawl { repo } => {
            crawl(&db, &repo).await?;
        }
        Commands::List => {
            list(&db).await?;
        }
        Commands::Status { project } => {
            status(&db, &project).await?;
        }
        Commands::Histogram {
            project,
            bucket,
            days,
        } => {
            histogram(&db, &project, bucket, days).await?;
        }
    }

    Ok(())
}

/// Log filter from `RUST_LOG` directives, falling back to the verbosity flag
fn log_filter(verbose: bool, directives: Option<&str>) -> EnvFilter {
    match directives.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => EnvFilter::new(directives),
        None if verbose => EnvFilter::new("debug"),
        None => EnvFilter::new("info"),
    }
}

async fn add_project(
    db: &Database,
    name: String,
    description_text_auto_update: bool,
    license_text_auto_update: bool,
) -> Result<()> {
    let project = db
        .create_project(NewProject {
            name,
            description_text_auto_update,
            license_text_auto_update,
        })
        .await?;

    println!("Added project {} (id {})", project.name, project.id);
    Ok(())
}

async fn add_repo(db: &Database, url: String, project: Option<&str>, repo_type: String) -> Result<()> {
    let project_id = match project {
        Some(name) => Some(db.get_project_by_name(name).await?.id),
        None => None,
    };

    let repo = db
        .create_source_repo(NewSourceRepo {
            project_id,
            repo_type,
            url,
            web_view_url: None,
        })
        .await?;

    println!("Added source repository {} (id {})", repo.url, repo.id);
    Ok(())
}

async fn crawl(db: &Database, target: &str) -> Result<()> {
    let config = CrawlerConfig::default();

    if config.github_token.is_none() {
        eprintln!("Warning: GITHUB_TOKEN not set. API rate limits will be restricted.");
    }

    let factory = RepoCrawlerFactory::with_system_tools(db.clone(), config)?;

    let repos = if target == "all" {
        db.get_source_repos().await?
    } else {
        let Ok(id) = target.parse::<i64>() else {
            bail!("expected a repository id or \"all\", got \"{}\"", target);
        };
        vec![db.get_source_repo(id).await?]
    };

    let mut failed = 0;
    for repo in repos {
        println!("Crawling {}...", repo.url);

        match crawl_repo(db, &factory, repo).await {
            Ok(stored) => println!("  {} new commits", stored),
            Err(e) => {
                failed += 1;
                eprintln!("  Error - {:#}", e);
            }
        }
    }

    if failed > 0 {
        println!("\nCrawl complete, {} repositories failed", failed);
    } else {
        println!("\nCrawl complete!");
    }
    Ok(())
}

/// Crawl one repository, flagging its project as in processing meanwhile
async fn crawl_repo(db: &Database, factory: &RepoCrawlerFactory, repo: SourceRepo) -> Result<usize> {
    let project_id = repo.project_id;
    let crawler = factory.crawler_for(repo)?;

    if let Some(id) = project_id {
        db.set_project_in_processing(id, true).await?;
    }

    let result = async {
        let stored = crawler.update_source_repo().await?;
        crawler.update_project().await?;
        Ok::<_, librecores_crawler::CrawlerError>(stored)
    }
    .await;

    if let Some(id) = project_id {
        if let Err(e) = db.set_project_in_processing(id, false).await {
            error!(project_id = id, error = %e, "Failed to reset processing flag");
        }
    }

    let stored = result?;
    info!(repo_id = crawler.repo().id, commits = stored, "Crawled repository");
    Ok(stored)
}

async fn list(db: &Database) -> Result<()> {
    let projects = db.get_projects().await?;
    let repos = db.get_source_repos().await?;

    println!("{:<5} {:<30} {:<50}", "ID", "PROJECT", "REPOSITORY");
    println!("{}", "-".repeat(85));

    for repo in &repos {
        let project = repo
            .project_id
            .and_then(|id| projects.iter().find(|p| p.id == id))
            .map(|p| p.name.as_str())
            .unwrap_or("-");
        println!("{:<5} {:<30} {:<50}", repo.id, project, repo.url);
    }

    for project in projects
        .iter()
        .filter(|p| !repos.iter().any(|r| r.project_id == Some(p.id)))
    {
        println!("{:<5} {:<30} {:<50}", "-", project.name, "-");
    }

    Ok(())
}

async fn status(db: &Database, project_name: &str) -> Result<()> {
    let project = db.get_project_by_name(project_name).await?;

    println!("Project: {} (id {})", project.name, project.id);
    println!(
        "Description: {}",
        if project.description_text.is_some() { "yes" } else { "-" }
    );
    println!(
        "License text: {}",
        if project.license_text.is_some() { "yes" } else { "-" }
    );
    if project.in_processing {
        println!("Crawl in progress");
    }

    for repo in db.get_source_repos_for_project(project.id).await? {
        let metrics = summarize(db, repo.id).await?;

        println!("\n{} ({})", repo.url, repo.repo_type);
        if let Some(ref web) = repo.web_view_url {
            println!("  Web: {}", web);
        }
        match repo.last_crawled_at {
            Some(at) => println!("  Last crawled: {}", at),
            None => {
                println!("  Not crawled yet.");
                continue;
            }
        }

        println!("  Commits: {}", metrics.commit_count);
        println!("  Contributors: {}", metrics.contributor_count);
        if let (Some(first), Some(last)) = (metrics.first_commit, metrics.last_commit) {
            println!("  Active: {} to {}", first.date_naive(), last.date_naive());
        }

        if !metrics.top_contributors.is_empty() {
            println!("  Top contributors:");
            for c in &metrics.top_contributors {
                println!("    {:<30} {}", c.name, c.commits);
            }
        }

        if !metrics.languages.is_empty() {
            println!("  Lines of code: {}", metrics.lines_of_code);
            for lang in &metrics.languages {
                println!(
                    "    {:<20} {:>8} {:>5.1}%",
                    lang.language, lang.lines_of_code, lang.share
                );
            }
        }

        if let Some(snap) = db.get_latest_github_snapshot(repo.id).await? {
            println!(
                "  GitHub: {} stars, {} forks, {} open issues, {} watchers",
                snap.stars, snap.forks, snap.open_issues, snap.watchers
            );
        }
    }

    Ok(())
}

async fn histogram(db: &Database, project_name: &str, bucket: Bucket, days: i64) -> Result<()> {
    if days < 0 {
        bail!("--days must not be negative");
    }

    let project = db.get_project_by_name(project_name).await?;
    let end = Utc::now();
    let start = end - Duration::days(days);

    for repo in db.get_source_repos_for_project(project.id).await? {
        let entries = commit_histogram(db, repo.id, start, end, bucket).await?;
        let peak = entries.iter().map(|e| e.commits).max().unwrap_or(0).max(1);

        println!("{} (commits per {})", repo.url, bucket);
        for entry in entries {
            let bar = "#".repeat((entry.commits * 40 / peak) as usize);
            println!("  {}  {:>5} {}", entry.start, entry.commits, bar);
        }
        println!();
    }

    Ok(())
}
