//! Crawl behaviour of the git crawler against a scripted git and cloc

mod common;

use common::*;
use librecores_crawler::{CrawlerError, RepoCrawler};
use librecores_database::*;
use std::time::Duration;

async fn git_crawler(db: &Database, runner: std::sync::Arc<ScriptedRunner>) -> RepoCrawler {
    let (_, repo) = project_with_repo(db, "https://git.example.org/mor1kx.git").await;
    let crawler = factory(db, runner, test_config()).crawler_for(repo).unwrap();
    assert!(matches!(crawler, RepoCrawler::Git(_)));
    crawler
}

#[tokio::test]
async fn test_first_crawl_ingests_full_history() {
    let db = Database::in_memory().await.unwrap();
    let runner = ScriptedRunner::new();
    let crawler = git_crawler(&db, runner.clone()).await;

    let stored = crawler.update_source_repo().await.unwrap();
    assert_eq!(stored, 3);
    assert_eq!(runner.count_calls("merge-base"), 0);

    let commits = db.get_commits(crawler.repo().id).await.unwrap();
    let ids: Vec<&str> = commits.iter().map(|c| c.commit_id.as_str()).collect();
    assert_eq!(ids, ["a1a1a1", "b2b2b2", "c3c3c3"]);
    assert_eq!(commits[0].files_modified, 2);
    assert_eq!(commits[0].lines_added, Some(40));
    assert_eq!(commits[0].lines_removed, None);
    assert_eq!(commits[1].lines_removed, Some(1));
    assert_eq!(commits[2].files_modified, 0);

    assert_eq!(db.get_contributor_count(crawler.repo().id).await.unwrap(), 2);

    let repo = db.get_source_repo(crawler.repo().id).await.unwrap();
    assert!(repo.last_crawled_at.is_some());
}

#[tokio::test]
async fn test_line_counts_replace_source_stats() {
    let db = Database::in_memory().await.unwrap();
    let runner = ScriptedRunner::new();
    let crawler = git_crawler(&db, runner.clone()).await;

    crawler.update_source_repo().await.unwrap();

    let stats = db.get_source_stats(crawler.repo().id).await.unwrap().unwrap();
    assert!(stats.available);
    assert_eq!(stats.total_files, 3);
    assert_eq!(stats.total_lines_of_code, 100);
    assert_eq!(stats.total_blank_lines, 10);
    assert_eq!(stats.total_lines_of_comments, 5);

    let languages = db.get_language_stats(crawler.repo().id).await.unwrap();
    assert_eq!(languages.len(), 2);
    assert_eq!(languages[0].language, "Verilog");
    assert_eq!(languages[0].file_count, 2);
    assert_eq!(languages[0].lines_of_code, 80);
    assert_eq!(languages[0].blank_line_count, 8);
    assert_eq!(languages[0].comment_line_count, 4);
    assert_eq!(languages[1].language, "C");
    assert_eq!(languages[1].lines_of_code, 20);

    let cloc = runner.calls().into_iter().find(|c| c.program == "cloc").unwrap();
    assert_eq!(&cloc.args[..2], ["--json", "--skip-uniqueness"]);
}

#[tokio::test]
async fn test_second_crawl_of_unchanged_remote_is_idempotent() {
    let db = Database::in_memory().await.unwrap();
    let runner = ScriptedRunner::new();
    let crawler = git_crawler(&db, runner.clone()).await;

    crawler.update_source_repo().await.unwrap();
    let stored = crawler.update_source_repo().await.unwrap();

    assert_eq!(stored, 0);
    assert_eq!(db.get_commit_count(crawler.repo().id).await.unwrap(), 3);
    assert_eq!(runner.count_calls("git clone"), 1);
    assert_eq!(runner.count_calls("cloc"), 1);
    assert_eq!(runner.count_calls("merge-base --is-ancestor c3c3c3 HEAD"), 1);
    assert_eq!(runner.count_calls("c3c3c3..."), 1);
}

#[tokio::test]
async fn test_process_timeouts() {
    let db = Database::in_memory().await.unwrap();
    let runner = ScriptedRunner::new();
    let crawler = git_crawler(&db, runner.clone()).await;

    crawler.update_source_repo().await.unwrap();
    runner.set_incremental_log(
        "d4d4d4|Olof Kindgren|olof@award-winning.me|Thu, 24 May 2018 09:00:00 +0000\n",
    );
    crawler.update_source_repo().await.unwrap();

    let calls = runner.calls();
    let timeout_of = |program: &str, first_arg: &str| -> Vec<Option<Duration>> {
        calls
            .iter()
            .filter(|spec| spec.program == program && spec.args[0] == first_arg)
            .map(|spec| spec.timeout)
            .collect()
    };

    assert_eq!(timeout_of("git", "clone"), [Some(Duration::from_secs(180))]);
    assert_eq!(timeout_of("git", "log"), [Some(Duration::from_secs(60)); 2]);
    assert_eq!(timeout_of("git", "merge-base"), [None]);
    assert_eq!(timeout_of("cloc", "--json"), [None, None]);
}

#[tokio::test]
async fn test_new_commits_are_appended() {
    let db = Database::in_memory().await.unwrap();
    let runner = ScriptedRunner::new();
    let crawler = git_crawler(&db, runner.clone()).await;

    crawler.update_source_repo().await.unwrap();
    runner.set_incremental_log(
        "d4d4d4|Olof Kindgren|olof@award-winning.me|Thu, 24 May 2018 09:00:00 +0000\n 1 file changed, 1 insertion(+)\n",
    );

    let stored = crawler.update_source_repo().await.unwrap();
    assert_eq!(stored, 1);

    let latest = db.get_latest_commit(crawler.repo().id).await.unwrap().unwrap();
    assert_eq!(latest.commit_id, "d4d4d4");
    assert_eq!(db.get_commit_count(crawler.repo().id).await.unwrap(), 4);
    assert_eq!(db.get_contributor_count(crawler.repo().id).await.unwrap(), 2);
    assert_eq!(runner.count_calls("cloc"), 2);
}

const REWRITTEN_LOG: &str = "\
e5e5e5|Olof Kindgren|olof@award-winning.me|Mon, 21 May 2018 10:00:00 +0200
 2 files changed, 40 insertions(+)
f6f6f6|Olof Kindgren|olof@award-winning.me|Fri, 25 May 2018 10:00:00 +0200
 1 file changed, 5 deletions(-)
";

#[tokio::test]
async fn test_history_rewrite_replaces_all_commits() {
    for code in [1, 128] {
        let db = Database::in_memory().await.unwrap();
        let runner = ScriptedRunner::new();
        let crawler = git_crawler(&db, runner.clone()).await;

        crawler.update_source_repo().await.unwrap();
        runner.set_ancestor_code(code);
        runner.set_full_log(REWRITTEN_LOG);

        let stored = crawler.update_source_repo().await.unwrap();
        assert_eq!(stored, 2, "exit code {code}");

        let commits = db.get_commits(crawler.repo().id).await.unwrap();
        let ids: Vec<&str> = commits.iter().map(|c| c.commit_id.as_str()).collect();
        assert_eq!(ids, ["e5e5e5", "f6f6f6"]);
        assert_eq!(runner.count_calls("cloc"), 2);
    }
}

#[tokio::test]
async fn test_ambiguous_ancestor_check_fails_the_crawl() {
    let db = Database::in_memory().await.unwrap();
    let runner = ScriptedRunner::new();
    let crawler = git_crawler(&db, runner.clone()).await;

    crawler.update_source_repo().await.unwrap();
    runner.set_ancestor_code(137);
    runner.set_full_log(REWRITTEN_LOG);
    runner.set_incremental_log(REWRITTEN_LOG);

    let err = crawler.update_source_repo().await.unwrap_err();
    match err {
        CrawlerError::AncestorCheck { dir, stderr } => {
            assert!(dir.contains("lc-gitrepocrawler-"));
            assert!(stderr.contains("merge-base failed"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let commits = db.get_commits(crawler.repo().id).await.unwrap();
    let ids: Vec<&str> = commits.iter().map(|c| c.commit_id.as_str()).collect();
    assert_eq!(ids, ["a1a1a1", "b2b2b2", "c3c3c3"]);
    assert_eq!(runner.count_calls("git log"), 1);
}

#[tokio::test]
async fn test_failed_clone_is_fatal() {
    let db = Database::in_memory().await.unwrap();
    let runner = ScriptedRunner::new();
    runner.set_clone_code(128);
    let crawler = git_crawler(&db, runner.clone()).await;

    let err = crawler.update_source_repo().await.unwrap_err();
    assert!(matches!(err, CrawlerError::Process { code: Some(128), .. }));
    assert_eq!(db.get_commit_count(crawler.repo().id).await.unwrap(), 0);

    let repo = db.get_source_repo(crawler.repo().id).await.unwrap();
    assert!(repo.last_crawled_at.is_none());
}

#[tokio::test]
async fn test_clone_is_memoized_and_removed_on_drop() {
    let db = Database::in_memory().await.unwrap();
    let runner = ScriptedRunner::new();
    let crawler = git_crawler(&db, runner.clone()).await;

    let RepoCrawler::Git(ref git) = crawler else {
        unreachable!()
    };
    let first = git.clone_path().await.unwrap().to_path_buf();
    let second = git.clone_path().await.unwrap().to_path_buf();
    assert_eq!(first, second);
    assert!(first.is_dir());
    assert_eq!(runner.count_calls("git clone"), 1);

    drop(crawler);
    assert!(!first.exists());
}

#[tokio::test]
async fn test_clone_is_removed_when_crawl_fails() {
    let db = Database::in_memory().await.unwrap();
    let runner = ScriptedRunner::new();
    runner.set_ancestor_code(2);
    let crawler = git_crawler(&db, runner.clone()).await;

    db.append_commits(
        crawler.repo().id,
        &librecores_crawler::commit_log::parse_commits(FULL_LOG).unwrap(),
    )
    .await
    .unwrap();

    assert!(crawler.update_source_repo().await.is_err());

    let clone = runner.calls()[0].args[2].clone();
    assert!(std::path::Path::new(&clone).is_dir());
    drop(crawler);
    assert!(!std::path::Path::new(&clone).exists());
}

#[tokio::test]
async fn test_factory_rejects_unsupported_repo_type() {
    let db = Database::in_memory().await.unwrap();
    let repo = db
        .create_source_repo(NewSourceRepo {
            project_id: None,
            repo_type: "svn".to_string(),
            url: "svn://example.org/repo".to_string(),
            web_view_url: None,
        })
        .await
        .unwrap();

    let result = factory(&db, ScriptedRunner::new(), test_config()).crawler_for(repo);
    assert!(matches!(result, Err(CrawlerError::UnsupportedRepoType(t)) if t == "svn"));
}

#[tokio::test]
async fn test_factory_selects_github_crawler_by_url() {
    let db = Database::in_memory().await.unwrap();
    let (_, repo) = project_with_repo(&db, "https://github.com/openrisc/mor1kx.git").await;

    let crawler = factory(&db, ScriptedRunner::new(), test_config())
        .crawler_for(repo)
        .unwrap();
    assert!(matches!(crawler, RepoCrawler::Github(_)));
    assert!(crawler.is_valid_repo_type());
}
