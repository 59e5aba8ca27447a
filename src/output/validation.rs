//! Data-quality checks over exported posts

use crate::post::Post;
use serde::Serialize;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Share of posts that must carry content for a data set to pass
pub const MIN_CONTENT_RATIO: f64 = 0.8;

/// Result of [`validate_posts`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub total_posts: usize,
    pub posts_with_content: usize,
    pub posts_with_timestamps: usize,
    pub posts_with_authors: usize,
}

impl ValidationReport {
    pub fn content_ratio(&self) -> f64 {
        if self.total_posts == 0 {
            0.0
        } else {
            self.posts_with_content as f64 / self.total_posts as f64
        }
    }
}

/// Counts field coverage per section and flags a low content rate
///
/// One issue is recorded per post without content; the data set is invalid
/// when fewer than 80% of posts have content. An empty data set is valid.
///
/// Accepts both the grouping written by a run ([`super::group_by_section`])
/// and the owned map read back by [`super::load_posts`].
pub fn validate_posts<K, P>(sections: &BTreeMap<K, Vec<P>>) -> ValidationReport
where
    K: Display,
    P: Borrow<Post>,
{
    let mut report = ValidationReport {
        valid: true,
        ..ValidationReport::default()
    };

    for (section, posts) in sections {
        report.total_posts += posts.len();

        for post in posts {
            let post = post.borrow();
            if post.content.trim().is_empty() {
                report
                    .issues
                    .push(format!("Post missing content in {}", section));
            } else {
                report.posts_with_content += 1;
            }

            if post.timestamp.is_some() {
                report.posts_with_timestamps += 1;
            }
            if !post.author.is_empty() {
                report.posts_with_authors += 1;
            }
        }
    }

    if report.total_posts > 0 && report.content_ratio() < MIN_CONTENT_RATIO {
        report.valid = false;
        report.issues.push("Low content extraction rate".to_string());
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::Section;
    use chrono::Utc;

    fn post(content: &str) -> Post {
        let mut post = Post::new(Section::new("general"), "p");
        post.content = content.to_string();
        post
    }

    #[test]
    fn test_empty_data_is_valid() {
        let report = validate_posts::<String, Post>(&BTreeMap::new());
        assert!(report.valid);
        assert_eq!(report.total_posts, 0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_counts_fields() {
        let mut with_all = post("hello");
        with_all.author = "anon_0123456789ab".to_string();
        with_all.timestamp = Some(Utc::now());

        let mut data = BTreeMap::new();
        data.insert("general".to_string(), vec![with_all, post("text")]);
        let report = validate_posts(&data);

        assert!(report.valid);
        assert_eq!(report.total_posts, 2);
        assert_eq!(report.posts_with_content, 2);
        assert_eq!(report.posts_with_timestamps, 1);
        assert_eq!(report.posts_with_authors, 1);
    }

    #[test]
    fn test_low_content_rate_is_invalid() {
        let mut data = BTreeMap::new();
        data.insert(
            "general".to_string(),
            vec![post("a"), post(""), post("b"), post("  ")],
        );
        let report = validate_posts(&data);

        assert!(!report.valid);
        assert_eq!(report.posts_with_content, 2);
        assert_eq!(
            report.issues,
            vec![
                "Post missing content in general".to_string(),
                "Post missing content in general".to_string(),
                "Low content extraction rate".to_string(),
            ]
        );
    }

    #[test]
    fn test_accepts_grouped_references() {
        let posts = vec![post("a"), post("")];
        let report = validate_posts(&crate::output::group_by_section(&posts));

        assert!(!report.valid);
        assert_eq!(report.total_posts, 2);
        assert_eq!(report.issues[0], "Post missing content in general");
    }

    #[test]
    fn test_exactly_eighty_percent_passes() {
        let mut data = BTreeMap::new();
        data.insert(
            "general".to_string(),
            vec![post("a"), post("b"), post("c"), post("d"), post("")],
        );
        let report = validate_posts(&data);
        assert!(report.valid);
        assert_eq!(report.issues.len(), 1);
    }
}
