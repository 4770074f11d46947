//! Parser for `cloc --json` reports

use crate::Result;
use librecores_database::{NewLanguageStat, NewSourceStats};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct ClocReport {
    header: ClocHeader,
    #[serde(rename = "SUM")]
    sum: ClocCounts,
    #[serde(flatten)]
    languages: BTreeMap<String, ClocLanguage>,
}

#[derive(Debug, Deserialize)]
struct ClocHeader {
    n_files: i64,
}

#[derive(Debug, Deserialize)]
struct ClocCounts {
    blank: i64,
    comment: i64,
    code: i64,
}

#[derive(Debug, Deserialize)]
struct ClocLanguage {
    #[serde(rename = "nFiles")]
    n_files: i64,
    blank: i64,
    comment: i64,
    code: i64,
}

/// Convert a cloc JSON report into source statistics
///
/// `header` and `SUM` provide the totals, every other key is a language.
/// cloc prints nothing at all for a tree without recognized source files,
/// which yields all-zero statistics.
pub fn parse_report(output: &str) -> Result<NewSourceStats> {
    if output.trim().is_empty() {
        return Ok(NewSourceStats::default());
    }

    let report: ClocReport = serde_json::from_str(output)?;

    let languages = report
        .languages
        .into_iter()
        .map(|(language, counts)| NewLanguageStat {
            language,
            file_count: counts.n_files,
            lines_of_code: counts.code,
            comment_line_count: counts.comment,
            blank_line_count: counts.blank,
        })
        .collect();

    Ok(NewSourceStats {
        total_files: report.header.n_files,
        total_lines_of_code: report.sum.code,
        total_blank_lines: report.sum.blank,
        total_lines_of_comments: report.sum.comment,
        languages,
    })
}
