//! Output module for exporting run results and reports
//!
//! This module handles:
//! - Exporting posts and summaries as JSON
//! - Generating markdown summaries of a run
//! - Checking the quality of exported data
//! - Printing summaries to the console

mod json;
mod markdown;
pub mod stats;
mod validation;

pub use json::{group_by_section, load_posts, write_posts, write_summary, SummaryDocument};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use stats::{print_run_summary, print_validation_report};
pub use validation::{validate_posts, ValidationReport, MIN_CONTENT_RATIO};

use crate::crawler::RunReport;
use crate::ForumError;
use std::path::{Path, PathBuf};

/// Files written for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub posts: PathBuf,
    pub summary: PathBuf,
    pub markdown: PathBuf,
}

/// Writes `posts_<ts>.json`, `summary_<ts>.json` and `summary_<ts>.md`
///
/// The timestamp is the run's start time, so all three files of a run share
/// it. The directory is created if missing.
///
/// # Arguments
///
/// * `report` - The finished run
/// * `directory` - Output directory
/// * `config_hash` - Hash of the configuration file, if known
pub fn write_run_output(
    report: &RunReport,
    directory: &Path,
    config_hash: Option<&str>,
) -> Result<OutputFiles, ForumError> {
    std::fs::create_dir_all(directory)?;

    let stamp = report.started_at.format("%Y%m%d_%H%M%S").to_string();
    let files = OutputFiles {
        posts: directory.join(format!("posts_{}.json", stamp)),
        summary: directory.join(format!("summary_{}.json", stamp)),
        markdown: directory.join(format!("summary_{}.md", stamp)),
    };

    write_posts(&report.posts, &files.posts)?;
    write_summary(report, config_hash, &files.summary)?;
    generate_markdown_summary(report, config_hash, &files.markdown)?;

    tracing::info!(
        "Wrote {} posts to {}",
        report.posts.len(),
        files.posts.display()
    );
    Ok(files)
}

/// Most recently modified `posts_*.json` in `directory`
pub fn find_latest_posts_file(directory: &Path) -> Result<Option<PathBuf>, ForumError> {
    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;

    for entry in std::fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with("posts_") && name.ends_with(".json")) {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        if latest.as_ref().map_or(true, |(time, _)| modified > *time) {
            latest = Some((modified, entry.path()));
        }
    }

    Ok(latest.map(|(_, path)| path))
}
