//! Commit counts grouped into calendar buckets

use crate::{MetricsError, Result};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use librecores_database::Database;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Width of a histogram bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Day,
    /// ISO week, starting on Monday
    Week,
    Month,
    Year,
}

impl Bucket {
    /// First day of the bucket containing `date`
    pub fn start_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Bucket::Day => date,
            Bucket::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            Bucket::Month => date - Duration::days(date.day0() as i64),
            Bucket::Year => date - Duration::days(date.ordinal0() as i64),
        }
    }

    /// First day of the bucket following the one starting at `start`
    pub fn next(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Bucket::Day => start.checked_add_signed(Duration::days(1)),
            Bucket::Week => start.checked_add_signed(Duration::days(7)),
            Bucket::Month => start.checked_add_months(Months::new(1)),
            Bucket::Year => start.checked_add_months(Months::new(12)),
        }
    }

    /// Midnight UTC at the start of the bucket containing `at`
    pub fn align(self, at: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of(at.date_naive()).and_time(NaiveTime::MIN).and_utc()
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Bucket::Day => "day",
            Bucket::Week => "week",
            Bucket::Month => "month",
            Bucket::Year => "year",
        };
        f.write_str(name)
    }
}

impl FromStr for Bucket {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Bucket::Day),
            "week" => Ok(Bucket::Week),
            "month" => Ok(Bucket::Month),
            "year" => Ok(Bucket::Year),
            other => Err(MetricsError::UnknownBucket(other.to_string())),
        }
    }
}

/// Number of commits in the bucket starting at `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramEntry {
    pub start: NaiveDate,
    pub commits: i64,
}

/// Group commit dates into consecutive buckets covering `[start, end]`
///
/// `start` is widened to the beginning of its bucket so the first bucket
/// counts all of its activity. Buckets without commits are included with a
/// count of zero. Dates outside the widened range are ignored.
pub fn group_by_bucket(
    dates: &[DateTime<Utc>],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bucket: Bucket,
) -> Result<Vec<HistogramEntry>> {
    if start > end {
        return Err(MetricsError::InvalidRange { start, end });
    }

    let start = bucket.align(start);
    let mut counts: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for date in dates.iter().filter(|d| **d >= start && **d <= end) {
        *counts.entry(bucket.start_of(date.date_naive())).or_default() += 1;
    }

    let last = bucket.start_of(end.date_naive());
    let mut entries = Vec::new();
    let mut current = Some(bucket.start_of(start.date_naive()));

    while let Some(day) = current.filter(|day| *day <= last) {
        entries.push(HistogramEntry {
            start: day,
            commits: counts.get(&day).copied().unwrap_or(0),
        });
        current = bucket.next(day);
    }

    Ok(entries)
}

/// Commit histogram of a repository between `start` and `end`, inclusive
///
/// The first bucket covers its whole period, including commits before `start`.
pub async fn commit_histogram(
    db: &Database,
    repo_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bucket: Bucket,
) -> Result<Vec<HistogramEntry>> {
    if start > end {
        return Err(MetricsError::InvalidRange { start, end });
    }

    let dates = db
        .get_commit_dates_between(repo_id, bucket.align(start), end)
        .await?;
    let entries = group_by_bucket(&dates, start, end, bucket)?;

    debug!(
        repo_id = repo_id,
        bucket = %bucket,
        commits = dates.len(),
        buckets = entries.len(),
        "Built commit histogram"
    );
    Ok(entries)
}
