//! Parser for `git log --format=%H|%aN|%aE|%aD --shortstat` output

use crate::{CrawlerError, Result};
use chrono::{DateTime, Utc};
use librecores_database::NewCommit;
use regex::Regex;
use std::sync::LazyLock;

/// Format string passed to `git log`
pub const LOG_FORMAT: &str = "--format=%H|%aN|%aE|%aD";

static COMMIT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\da-f]+)\|(.+)\|(.+@.+)\|(.+)$").expect("invalid regex"));

static SHORTSTAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) files? changed(?:, (\d+) insertions?\(\+\))?(?:, (\d+) deletions?\(-\))?")
        .expect("invalid regex")
});

/// Parse the commits of a `git log` run, in output order
///
/// Each commit is a header line `<hash>|<name>|<email>|<date>`, optionally
/// followed by a shortstat summary line. Commits without file changes (empty
/// merges) have no summary line. Lines matching neither are skipped.
pub fn parse_commits(output: &str) -> Result<Vec<NewCommit>> {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();

    let mut commits = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(header) = COMMIT_HEADER.captures(lines[i]) else {
            i += 1;
            continue;
        };

        let mut commit = NewCommit {
            commit_id: header[1].to_string(),
            author_name: header[2].to_string(),
            author_email: header[3].to_string(),
            date_committed: parse_date(&header[4])?,
            files_modified: 0,
            lines_added: None,
            lines_removed: None,
        };

        if let Some(stat) = lines.get(i + 1).and_then(|next| SHORTSTAT.captures(next)) {
            commit.files_modified = parse_count(&stat[1])?;
            commit.lines_added = stat.get(2).map(|m| parse_count(m.as_str())).transpose()?;
            commit.lines_removed = stat.get(3).map(|m| parse_count(m.as_str())).transpose()?;
            i += 1;
        }

        commits.push(commit);
        i += 1;
    }

    Ok(commits)
}

/// Parse a `%aD` date (RFC 2822) and normalize it to UTC
fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| CrawlerError::Parse(format!("invalid commit date '{}': {}", value, e)))
}

fn parse_count(value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| CrawlerError::Parse(format!("invalid count '{}'", value)))
}
