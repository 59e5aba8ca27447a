//! Console summaries
//!
//! This module prints run results and validation reports to stdout.

use crate::crawler::RunReport;
use crate::output::markdown::WEEKDAYS;
use crate::output::validation::ValidationReport;
use crate::post::OpportunityCategory;

/// Prints a run summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The finished run
pub fn print_run_summary(report: &RunReport) {
    let corpus = &report.summary.corpus;

    println!("=== Run Summary ===\n");

    if report.aborted {
        println!(
            "Run aborted: {}\n",
            report.abort_reason.as_deref().unwrap_or("unknown reason")
        );
    }

    println!("Overview:");
    println!("  Total posts: {}", report.posts.len());
    println!("  Sections crawled: {}", report.sections.len());
    println!();

    if !report.sections.is_empty() {
        println!("Posts by Section:");
        for section in &report.sections {
            println!(
                "  {}: {} posts, {} pages ({})",
                section.section, section.posts, section.pages_fetched, section.outcome
            );
        }
        println!();
    }

    println!("Engagement:");
    println!("  Average replies per post: {:.1}", corpus.average_replies);
    println!("  Average views per post: {:.1}", corpus.average_views);
    println!("  High engagement posts: {}", corpus.high_engagement);
    println!();

    println!("Content Analysis:");
    println!("  Questions identified: {}", corpus.questions);
    println!("  Answers identified: {}", corpus.answers);
    println!("  Resource mentions: {}", corpus.resource_mentions);
    println!();

    let opportunities: Vec<_> = OpportunityCategory::ALL
        .iter()
        .filter_map(|c| corpus.opportunities.get(c).map(|n| (c, *n)))
        .filter(|(_, n)| *n > 0)
        .collect();
    if !opportunities.is_empty() {
        println!("Business Opportunities:");
        for (category, count) in opportunities {
            println!("  {}: {} posts", category, count);
        }
        println!();
    }

    if let Some(day) = corpus.peak_weekday() {
        println!("Busiest day (UTC): {}", WEEKDAYS[day]);
    }
    if let Some(hour) = corpus.peak_hour() {
        println!("Busiest hour (UTC): {:02}:00", hour);
    }
}

/// Prints a data-quality report to stdout
pub fn print_validation_report(report: &ValidationReport) {
    if report.valid {
        println!("Data validation passed");
    } else {
        println!("Data validation failed");
    }

    // Per-post issues repeat; show each distinct one with a count
    let mut issues: Vec<(&String, usize)> = Vec::new();
    for issue in &report.issues {
        match issues.iter_mut().find(|(seen, _)| *seen == issue) {
            Some((_, count)) => *count += 1,
            None => issues.push((issue, 1)),
        }
    }
    for (issue, count) in issues {
        if count > 1 {
            println!("  - {} (x{})", issue, count);
        } else {
            println!("  - {}", issue);
        }
    }

    println!("\nData Statistics:");
    println!("  Total posts: {}", report.total_posts);
    println!("  Posts with content: {}", report.posts_with_content);
    println!("  Posts with timestamps: {}", report.posts_with_timestamps);
    println!("  Posts with authors: {}", report.posts_with_authors);
}
