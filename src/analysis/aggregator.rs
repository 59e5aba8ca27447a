//! Section- and corpus-level statistics

use crate::post::{OpportunityCategory, Post, Section};
use chrono::{Datelike, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default score above which a post counts as high engagement
pub const DEFAULT_HIGH_ENGAGEMENT_THRESHOLD: f64 = 50.0;

/// Raw integer counters; averages are only derived in [`Stats`]
#[derive(Debug, Clone, PartialEq, Eq)]
struct Counters {
    posts: u64,
    questions: u64,
    answers: u64,
    total_replies: u64,
    total_views: u64,
    opportunities: BTreeMap<OpportunityCategory, u64>,
    hours: [u64; 24],
    weekdays: [u64; 7],
    resource_mentions: u64,
    high_engagement: u64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            posts: 0,
            questions: 0,
            answers: 0,
            total_replies: 0,
            total_views: 0,
            opportunities: OpportunityCategory::ALL.iter().map(|c| (*c, 0)).collect(),
            hours: [0; 24],
            weekdays: [0; 7],
            resource_mentions: 0,
            high_engagement: 0,
        }
    }
}

impl Counters {
    fn add(&mut self, post: &Post, threshold: f64) {
        self.posts += 1;
        self.questions += u64::from(post.is_question);
        self.answers += u64::from(post.is_answer);
        self.total_replies = self.total_replies.saturating_add(post.replies_count);
        self.total_views = self.total_views.saturating_add(post.views_count);
        *self.opportunities.entry(post.opportunity).or_default() += 1;

        if let Some(ts) = post.timestamp {
            self.hours[ts.hour() as usize] += 1;
            self.weekdays[ts.weekday().num_days_from_monday() as usize] += 1;
        }

        self.resource_mentions += post.resource_mentions.len() as u64;
        if post.engagement_score > threshold {
            self.high_engagement += 1;
        }
    }

    fn merge(&mut self, other: &Counters) {
        self.posts += other.posts;
        self.questions += other.questions;
        self.answers += other.answers;
        self.total_replies = self.total_replies.saturating_add(other.total_replies);
        self.total_views = self.total_views.saturating_add(other.total_views);
        for (category, count) in &other.opportunities {
            *self.opportunities.entry(*category).or_default() += count;
        }
        for (mine, theirs) in self.hours.iter_mut().zip(other.hours.iter()) {
            *mine += theirs;
        }
        for (mine, theirs) in self.weekdays.iter_mut().zip(other.weekdays.iter()) {
            *mine += theirs;
        }
        self.resource_mentions += other.resource_mentions;
        self.high_engagement += other.high_engagement;
    }

    fn snapshot(&self) -> Stats {
        let average = |total: u64| {
            if self.posts == 0 {
                0.0
            } else {
                total as f64 / self.posts as f64
            }
        };

        Stats {
            posts: self.posts,
            questions: self.questions,
            answers: self.answers,
            total_replies: self.total_replies,
            total_views: self.total_views,
            average_replies: average(self.total_replies),
            average_views: average(self.total_views),
            opportunities: self.opportunities.clone(),
            posts_by_hour: self.hours,
            posts_by_weekday: self.weekdays,
            resource_mentions: self.resource_mentions,
            high_engagement: self.high_engagement,
        }
    }
}

/// Statistics for one section or the whole corpus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub posts: u64,
    pub questions: u64,
    pub answers: u64,
    pub total_replies: u64,
    pub total_views: u64,
    pub average_replies: f64,
    pub average_views: f64,

    /// Every category is present, with zero when unused
    pub opportunities: BTreeMap<OpportunityCategory, u64>,

    /// UTC hour of day, 0 to 23; posts without a timestamp are not counted
    pub posts_by_hour: [u64; 24],

    /// UTC day of week, Monday first
    pub posts_by_weekday: [u64; 7],

    pub resource_mentions: u64,
    pub high_engagement: u64,
}

impl Stats {
    /// Share of posts flagged as questions, in `[0, 1]`
    pub fn question_ratio(&self) -> f64 {
        if self.posts == 0 {
            0.0
        } else {
            self.questions as f64 / self.posts as f64
        }
    }

    /// Hour with the most posts, if any post had a timestamp
    pub fn peak_hour(&self) -> Option<usize> {
        peak(&self.posts_by_hour)
    }

    /// Weekday (0 = Monday) with the most posts
    pub fn peak_weekday(&self) -> Option<usize> {
        peak(&self.posts_by_weekday)
    }
}

fn peak(histogram: &[u64]) -> Option<usize> {
    histogram
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(index, _)| index)
}

/// A consistent snapshot of an [`Aggregator`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub high_engagement_threshold: f64,
    pub corpus: Stats,
    pub sections: BTreeMap<Section, Stats>,
}

impl Summary {
    /// An all-zero summary with no sections
    pub fn empty(threshold: f64) -> Self {
        Aggregator::new(threshold).summary()
    }
}

/// Folds classified posts into counters
///
/// Only integer sums are kept, so the result does not depend on the order
/// in which posts arrive.
#[derive(Debug, Clone)]
pub struct Aggregator {
    threshold: f64,
    corpus: Counters,
    sections: BTreeMap<Section, Counters>,
}

impl Aggregator {
    pub fn new(high_engagement_threshold: f64) -> Self {
        Self {
            threshold: high_engagement_threshold,
            corpus: Counters::default(),
            sections: BTreeMap::new(),
        }
    }

    /// Makes `section` appear in the summary even if it yields no posts
    pub fn register(&mut self, section: &Section) {
        self.sections.entry(section.clone()).or_default();
    }

    pub fn fold(&mut self, post: &Post) {
        self.corpus.add(post, self.threshold);
        self.sections
            .entry(post.section.clone())
            .or_default()
            .add(post, self.threshold);
    }

    /// Combines another aggregator's counters into this one
    ///
    /// Equivalent to folding every post the other one saw.
    pub fn merge(&mut self, other: &Aggregator) {
        self.corpus.merge(&other.corpus);
        for (section, counters) in &other.sections {
            self.sections
                .entry(section.clone())
                .or_default()
                .merge(counters);
        }
    }

    pub fn posts(&self) -> u64 {
        self.corpus.posts
    }

    pub fn summary(&self) -> Summary {
        Summary {
            high_engagement_threshold: self.threshold,
            corpus: self.corpus.snapshot(),
            sections: self
                .sections
                .iter()
                .map(|(section, counters)| (section.clone(), counters.snapshot()))
                .collect(),
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_ENGAGEMENT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(section: &str, id: &str) -> Post {
        Post::new(Section::new(section), id)
    }

    fn sample() -> Vec<Post> {
        let mut a = post("general", "1");
        a.is_question = true;
        a.replies_count = 4;
        a.views_count = 100;
        a.opportunity = OpportunityCategory::Service;
        a.engagement_score = 62.0;
        // Wednesday 14:30 UTC
        a.timestamp = Some(Utc.with_ymd_and_hms(2024, 1, 17, 14, 30, 0).unwrap());
        a.resource_mentions.insert("doctor".to_string());

        let mut b = post("general", "2");
        b.is_answer = true;
        b.replies_count = 2;
        b.views_count = 50;
        b.engagement_score = 50.0;
        b.timestamp = Some(Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap());

        let mut c = post("parenting", "3");
        c.is_question = true;
        c.is_answer = true;
        c.opportunity = OpportunityCategory::Product;
        c.resource_mentions.insert("book".to_string());
        c.resource_mentions.insert("app".to_string());

        vec![a, b, c]
    }

    #[test]
    fn test_empty_summary() {
        let summary = Aggregator::default().summary();
        assert_eq!(summary.corpus.posts, 0);
        assert_eq!(summary.corpus.average_replies, 0.0);
        assert_eq!(summary.corpus.opportunities.len(), 5);
        assert!(summary.corpus.opportunities.values().all(|c| *c == 0));
        assert!(summary.sections.is_empty());
        assert_eq!(summary, Summary::empty(DEFAULT_HIGH_ENGAGEMENT_THRESHOLD));
    }

    #[test]
    fn test_fold_counts() {
        let mut agg = Aggregator::default();
        for p in sample() {
            agg.fold(&p);
        }
        let summary = agg.summary();
        let corpus = &summary.corpus;

        assert_eq!(corpus.posts, 3);
        assert_eq!(corpus.questions, 2);
        assert_eq!(corpus.answers, 2);
        assert_eq!(corpus.total_replies, 6);
        assert_eq!(corpus.total_views, 150);
        assert!((corpus.average_replies - 2.0).abs() < 1e-9);
        assert_eq!(corpus.opportunities[&OpportunityCategory::Service], 1);
        assert_eq!(corpus.opportunities[&OpportunityCategory::Product], 1);
        assert_eq!(corpus.opportunities[&OpportunityCategory::Uncategorized], 1);
        assert_eq!(corpus.resource_mentions, 3);
        // Strictly above the threshold
        assert_eq!(corpus.high_engagement, 1);

        assert_eq!(corpus.posts_by_hour[14], 1);
        assert_eq!(corpus.posts_by_hour[9], 1);
        assert_eq!(corpus.posts_by_hour.iter().sum::<u64>(), 2);
        assert_eq!(corpus.posts_by_weekday[2], 1);
        assert_eq!(corpus.posts_by_weekday[0], 1);

        assert_eq!(summary.sections[&Section::new("general")].posts, 2);
        assert_eq!(summary.sections[&Section::new("parenting")].posts, 1);
    }

    #[test]
    fn test_order_independent() {
        let posts = sample();

        let mut forward = Aggregator::default();
        posts.iter().for_each(|p| forward.fold(p));

        let mut backward = Aggregator::default();
        posts.iter().rev().for_each(|p| backward.fold(p));

        assert_eq!(forward.summary(), backward.summary());
    }

    #[test]
    fn test_merge_matches_single_fold() {
        let posts = sample();

        let mut all = Aggregator::default();
        posts.iter().for_each(|p| all.fold(p));

        let mut left = Aggregator::default();
        let mut right = Aggregator::default();
        left.fold(&posts[0]);
        right.fold(&posts[1]);
        right.fold(&posts[2]);
        left.merge(&right);

        assert_eq!(left.summary(), all.summary());
    }

    #[test]
    fn test_registered_section_without_posts() {
        let mut agg = Aggregator::default();
        agg.register(&Section::new("quiet"));
        let summary = agg.summary();
        assert_eq!(summary.sections[&Section::new("quiet")].posts, 0);
        assert_eq!(summary.corpus.posts, 0);
    }

    #[test]
    fn test_peaks() {
        let mut agg = Aggregator::default();
        for p in sample() {
            agg.fold(&p);
        }
        let corpus = agg.summary().corpus;
        // Tie between 9 and 14 goes to the earlier hour
        assert_eq!(corpus.peak_hour(), Some(9));
        assert_eq!(corpus.peak_weekday(), Some(0));
        assert!((corpus.question_ratio() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(Aggregator::default().summary().corpus.peak_hour(), None);
    }

    #[test]
    fn test_summary_serializes() {
        let mut agg = Aggregator::default();
        agg.fold(&sample()[0]);
        let json = serde_json::to_value(agg.summary()).unwrap();
        assert_eq!(json["corpus"]["opportunities"]["service"], 1);
        assert_eq!(json["sections"]["general"]["posts"], 1);
    }
}
