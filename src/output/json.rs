//! JSON export of posts and run summaries

use crate::analysis::{Insights, Summary};
use crate::crawler::{RunReport, SectionReport};
use crate::post::{Post, Section};
use crate::ForumError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Run metadata and statistics as written to `summary_<ts>.json`
#[derive(Debug, Serialize)]
pub struct SummaryDocument<'a> {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: Option<&'a str>,
    pub total_posts: usize,
    pub aborted: bool,
    pub abort_reason: Option<&'a str>,
    pub sections: &'a [SectionReport],
    pub statistics: &'a Summary,
    pub insights: &'a Insights,
}

impl<'a> SummaryDocument<'a> {
    pub fn new(report: &'a RunReport, config_hash: Option<&'a str>) -> Self {
        Self {
            started_at: report.started_at,
            finished_at: report.finished_at,
            config_hash,
            total_posts: report.posts.len(),
            aborted: report.aborted,
            abort_reason: report.abort_reason.as_deref(),
            sections: &report.sections,
            statistics: &report.summary,
            insights: &report.insights,
        }
    }
}

/// Groups posts by section, keeping crawl order within each section
pub fn group_by_section(posts: &[Post]) -> BTreeMap<&Section, Vec<&Post>> {
    let mut grouped: BTreeMap<&Section, Vec<&Post>> = BTreeMap::new();
    for post in posts {
        grouped.entry(&post.section).or_default().push(post);
    }
    grouped
}

/// Writes posts grouped by section as pretty-printed JSON
pub fn write_posts(posts: &[Post], path: &Path) -> Result<(), ForumError> {
    write_json(&group_by_section(posts), path)
}

/// Writes the run summary document
pub fn write_summary(
    report: &RunReport,
    config_hash: Option<&str>,
    path: &Path,
) -> Result<(), ForumError> {
    write_json(&SummaryDocument::new(report, config_hash), path)
}

/// Reads a posts file written by [`write_posts`]
///
/// Section names are kept as plain strings; the file may come from a run
/// with a different configuration.
pub fn load_posts(path: &Path) -> Result<BTreeMap<String, Vec<Post>>, ForumError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ForumError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
