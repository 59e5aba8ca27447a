//! Markdown summary generation
//!
//! This module generates a human-readable markdown report of a run,
//! including per-section outcomes, engagement and opportunity statistics,
//! business insights, and posting-time histograms.

use crate::analysis::{Insights, Stats};
use crate::crawler::RunReport;
use crate::post::OpportunityCategory;
use crate::ForumError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Resource gaps listed per section in the report
const GAPS_PER_SECTION: usize = 5;

pub(crate) const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Generates a markdown summary of a run
///
/// # Arguments
///
/// * `report` - The finished run
/// * `config_hash` - Hash of the configuration file, if known
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(ForumError)` - Failed to write summary
pub fn generate_markdown_summary(
    report: &RunReport,
    config_hash: Option<&str>,
    output_path: &Path,
) -> Result<(), ForumError> {
    let markdown = format_markdown_summary(report, config_hash);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run report as markdown
pub fn format_markdown_summary(report: &RunReport, config_hash: Option<&str>) -> String {
    let mut md = String::new();
    let corpus = &report.summary.corpus;

    md.push_str("# Forum-Sieve Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    let duration = (report.finished_at - report.started_at).num_seconds().max(0);
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        duration,
        duration as f64 / 60.0
    ));
    if report.aborted {
        md.push_str(&format!(
            "- **Status**: aborted ({})\n",
            report.abort_reason.as_deref().unwrap_or("unknown reason")
        ));
    } else {
        md.push_str("- **Status**: completed\n");
    }
    if let Some(hash) = config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Section outcomes
    if !report.sections.is_empty() {
        md.push_str("## Sections\n\n");
        md.push_str("| Section | Outcome | Pages | Posts | Duplicates | Detail |\n");
        md.push_str("|---------|---------|-------|-------|------------|--------|\n");
        for section in &report.sections {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                section.section,
                section.outcome,
                section.pages_fetched,
                section.posts,
                section.duplicates,
                section.detail.as_deref().unwrap_or("")
            ));
        }
        md.push('\n');
    }

    md.push_str("## Overall Statistics\n\n");
    push_stats(&mut md, corpus, report.summary.high_engagement_threshold);

    // Opportunities
    md.push_str("## Business Opportunities\n\n");
    md.push_str("| Category | Posts |\n");
    md.push_str("|----------|-------|\n");
    for category in OpportunityCategory::ALL {
        let count = corpus.opportunities.get(&category).copied().unwrap_or(0);
        md.push_str(&format!("| {} | {} |\n", category, count));
    }
    md.push('\n');

    if !report.insights.is_empty() {
        push_insights(&mut md, &report.insights);
    }

    // Posting times
    if corpus.posts_by_hour.iter().any(|c| *c > 0) {
        md.push_str("## Posting Times (UTC)\n\n");
        if let Some(hour) = corpus.peak_hour() {
            md.push_str(&format!("- **Busiest Hour**: {:02}:00\n", hour));
        }
        if let Some(day) = corpus.peak_weekday() {
            md.push_str(&format!("- **Busiest Day**: {}\n", WEEKDAYS[day]));
        }
        md.push('\n');

        md.push_str("| Day | Posts |\n");
        md.push_str("|-----|-------|\n");
        for (day, count) in WEEKDAYS.iter().zip(corpus.posts_by_weekday.iter()) {
            md.push_str(&format!("| {} | {} |\n", day, count));
        }
        md.push('\n');

        md.push_str("| Hour | Posts |\n");
        md.push_str("|------|-------|\n");
        for (hour, count) in corpus.posts_by_hour.iter().enumerate() {
            if *count > 0 {
                md.push_str(&format!("| {:02} | {} |\n", hour, count));
            }
        }
        md.push('\n');
    }

    // Per-section statistics
    for (section, stats) in &report.summary.sections {
        md.push_str(&format!("## Section: {}\n\n", section));
        push_stats(&mut md, stats, report.summary.high_engagement_threshold);
    }

    md
}

fn push_insights(md: &mut String, insights: &Insights) {
    md.push_str("## Business Insights\n\n");

    for (category, insight) in &insights.categories {
        md.push_str(&format!(
            "### {} ({} posts, {:.1} average replies)\n\n",
            category, insight.posts, insight.average_replies
        ));
        for post in &insight.top_posts {
            let title = if post.title.is_empty() {
                &post.preview
            } else {
                &post.title
            };
            md.push_str(&format!(
                "- **{}** ({}, {} replies, {} views, score {:.1})\n",
                title, post.section, post.replies, post.views, post.engagement_score
            ));
        }
        md.push('\n');
    }

    if !insights.top_mentions.is_empty() {
        md.push_str("### Top Mentions\n\n");
        for mention in &insights.top_mentions {
            md.push_str(&format!("- {}: {} mentions\n", mention.name, mention.count));
        }
        md.push('\n');
    }

    if insights.service_kinds.values().any(|c| *c > 0) {
        md.push_str("### Service Kinds\n\n");
        md.push_str("| Kind | Posts |\n");
        md.push_str("|------|-------|\n");
        for (kind, count) in &insights.service_kinds {
            md.push_str(&format!("| {} | {} |\n", kind, count));
        }
        md.push('\n');
    }

    if !insights.pain_points.is_empty() {
        md.push_str("### Pain Points\n\n");
        for (i, pain) in insights.pain_points.iter().enumerate() {
            md.push_str(&format!(
                "{}. {} (section: {}, replies: {})\n",
                i + 1,
                pain.text,
                pain.section,
                pain.replies
            ));
        }
        md.push('\n');
    }

    if !insights.resource_gaps.is_empty() {
        md.push_str("### Resource Gaps\n\n");
        for (section, gaps) in &insights.resource_gaps {
            md.push_str(&format!("#### {}\n\n", section));
            for gap in gaps.iter().take(GAPS_PER_SECTION) {
                md.push_str(&format!("- {}\n", gap));
            }
            md.push('\n');
        }
    }

    if insights.posts_by_month.iter().any(|c| *c > 0) {
        md.push_str("### Posts by Month\n\n");
        md.push_str("| Month | Posts |\n");
        md.push_str("|-------|-------|\n");
        for (month, count) in MONTHS.iter().zip(insights.posts_by_month.iter()) {
            if *count > 0 {
                md.push_str(&format!("| {} | {} |\n", month, count));
            }
        }
        md.push('\n');
    }

    let seasons: Vec<String> = insights
        .seasonal_topics
        .iter()
        .filter(|(_, topics)| !topics.is_empty())
        .map(|(season, topics)| {
            let listed = topics
                .iter()
                .map(|t| format!("{} ({})", t.term, t.posts))
                .collect::<Vec<_>>()
                .join(", ");
            format!("- **{}**: {}\n", season, listed)
        })
        .collect();
    if !seasons.is_empty() {
        md.push_str("### Seasonal Topics\n\n");
        for line in seasons {
            md.push_str(&line);
        }
        md.push('\n');
    }
}

fn push_stats(md: &mut String, stats: &Stats, threshold: f64) {
    md.push_str(&format!("- **Posts**: {}\n", stats.posts));
    md.push_str(&format!(
        "- **Questions**: {} ({:.1}%)\n",
        stats.questions,
        stats.question_ratio() * 100.0
    ));
    md.push_str(&format!("- **Answers**: {}\n", stats.answers));
    md.push_str(&format!(
        "- **Average Replies**: {:.1}\n",
        stats.average_replies
    ));
    md.push_str(&format!("- **Average Views**: {:.1}\n", stats.average_views));
    md.push_str(&format!(
        "- **High Engagement (> {})**: {}\n",
        threshold, stats.high_engagement
    ));
    md.push_str(&format!(
        "- **Resource Mentions**: {}\n\n",
        stats.resource_mentions
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Aggregator, InsightAnalyzer};
    use crate::config::InsightsConfig;
    use crate::crawler::SectionReport;
    use crate::post::{Post, Section};
    use crate::state::TerminationReason;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn report() -> RunReport {
        let mut post = Post::new(Section::new("general"), "1");
        post.title = "Looking for a pediatrician".to_string();
        post.content = "Our doctor retired and finding a new one is a struggle. Any ideas?".to_string();
        post.is_question = true;
        post.replies_count = 1;
        post.views_count = 40;
        post.engagement_score = 12.5;
        post.opportunity = OpportunityCategory::Service;
        post.timestamp = Some(Utc.with_ymd_and_hms(2024, 1, 17, 14, 30, 0).unwrap());
        let insights = InsightAnalyzer::new(&InsightsConfig::default()).analyze(&[post.clone()]);

        let mut aggregator = Aggregator::default();
        aggregator.fold(&post);

        RunReport {
            started_at: Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap(),
            finished_at: Utc.with_ymd_and_hms(2024, 2, 1, 10, 3, 0).unwrap(),
            posts: vec![post],
            summary: aggregator.summary(),
            insights,
            sections: vec![SectionReport {
                section: Section::new("general"),
                outcome: TerminationReason::Exhausted,
                pages_fetched: 2,
                posts: 1,
                duplicates: 0,
                detail: None,
            }],
            aborted: false,
            abort_reason: None,
        }
    }

    #[test]
    fn test_format_markdown_summary() {
        let md = format_markdown_summary(&report(), Some("deadbeef"));

        assert!(md.starts_with("# Forum-Sieve Run Summary"));
        assert!(md.contains("- **Duration**: 180 seconds (3.00 minutes)"));
        assert!(md.contains("- **Config Hash**: deadbeef"));
        assert!(md.contains("| general | exhausted | 2 | 1 | 0 |  |"));
        assert!(md.contains("| service | 1 |"));
        assert!(md.contains("| uncategorized | 0 |"));
        assert!(md.contains("- **Busiest Hour**: 14:00"));
        assert!(md.contains("- **Busiest Day**: Wednesday"));
        assert!(md.contains("## Section: general"));
        assert!(md.contains("- **Questions**: 1 (100.0%)"));
    }

    #[test]
    fn test_business_insights_section() {
        let md = format_markdown_summary(&report(), None);

        assert!(md.contains("## Business Insights"));
        assert!(md.contains("### service (1 posts, 1.0 average replies)"));
        assert!(md.contains("- **Looking for a pediatrician** (general, 1 replies, 40 views, score 12.5)"));
        assert!(md.contains("| medical | 1 |"));
        assert!(md.contains(
            "1. Our doctor retired and finding a new one is a struggle (section: general, replies: 1)"
        ));
        assert!(md.contains("#### general\n\n- Looking for a pediatrician\n"));
        assert!(md.contains("| January | 1 |"));
        assert!(!md.contains("### Seasonal Topics"));
    }

    #[test]
    fn test_no_insights_section_without_posts() {
        let mut report = report();
        report.insights = Insights::default();
        let md = format_markdown_summary(&report, None);
        assert!(!md.contains("## Business Insights"));
    }

    #[test]
    fn test_aborted_status() {
        let mut report = report();
        report.aborted = true;
        report.abort_reason = Some("Authentication failed: locked".to_string());
        let md = format_markdown_summary(&report, None);
        assert!(md.contains("- **Status**: aborted (Authentication failed: locked)"));
        assert!(!md.contains("Config Hash"));
    }

    #[test]
    fn test_generate_markdown_summary_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.md");
        generate_markdown_summary(&report(), None, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("## Business Opportunities"));
    }
}
