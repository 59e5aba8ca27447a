//! Business insights over a finished run
//!
//! Everything here reads already classified and anonymized posts:
//! - Per-category breakdown with the highest-engagement posts
//! - Frequently mentioned names in product discussions
//! - Service kinds asked about
//! - Pain-point sentences ranked by replies
//! - Poorly answered questions per section (resource gaps)
//! - Posting months and seasonal topic counts

use crate::analysis::classifier::{compile_terms, Term, STOP_WORDS};
use crate::config::InsightsConfig;
use crate::post::{OpportunityCategory, Post};
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const PREVIEW_CHARS: usize = 200;
const GAP_CHARS: usize = 150;
const MIN_PAIN_SENTENCE_CHARS: usize = 20;
const PAIN_SENTENCES_PER_POST: usize = 2;

/// Capitalized words and runs of them, e.g. "Uppababy Vista"
static CAPITALIZED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").expect("valid capitalized phrase regex")
});

/// Short words that start sentences; never a mention on their own
const SENTENCE_STARTERS: &[&str] = &[
    "a", "an", "and", "any", "but", "can", "did", "do", "for", "hi", "how", "if", "in", "is",
    "it", "my", "no", "not", "of", "on", "or", "our", "so", "the", "we", "yes", "you",
];

/// A post worth reading first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostHighlight {
    pub section: String,
    pub post_id: String,
    pub title: String,
    pub preview: String,
    pub replies: u64,
    pub views: u64,
    pub engagement_score: f64,
}

/// Breakdown of one opportunity category
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryInsight {
    pub posts: usize,
    pub average_replies: f64,
    pub sections: BTreeMap<String, usize>,
    pub top_posts: Vec<PostHighlight>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mention {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PainPoint {
    pub text: String,
    pub section: String,
    pub replies: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub term: String,
    pub posts: usize,
}

/// Business insights for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Insights {
    /// Only categories with at least one post; `uncategorized` is left out
    pub categories: BTreeMap<OpportunityCategory, CategoryInsight>,
    pub top_mentions: Vec<Mention>,
    pub service_kinds: BTreeMap<String, usize>,
    pub pain_points: Vec<PainPoint>,
    pub resource_gaps: BTreeMap<String, Vec<String>>,

    /// Posts per calendar month (UTC), January first
    pub posts_by_month: [u64; 12],

    /// Season -> topic terms found, in configured order
    pub seasonal_topics: BTreeMap<String, Vec<TopicCount>>,
}

impl Insights {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.pain_points.is_empty()
            && self.resource_gaps.is_empty()
            && self.posts_by_month.iter().all(|c| *c == 0)
    }
}

/// Computes [`Insights`] from the configured term tables
#[derive(Debug, Clone)]
pub struct InsightAnalyzer {
    pain_terms: Vec<Term>,
    service_kinds: Vec<(String, Vec<Term>)>,
    seasonal_topics: Vec<(String, Vec<Term>)>,
    gap_reply_limit: u64,
    top_posts: usize,
    top_mentions: usize,
    max_pain_points: usize,
    max_gaps_per_section: usize,
}

impl InsightAnalyzer {
    pub fn new(config: &InsightsConfig) -> Self {
        let table = |rows: &BTreeMap<String, Vec<String>>| -> Vec<(String, Vec<Term>)> {
            rows.iter()
                .map(|(name, terms)| (name.clone(), compile_terms(terms)))
                .collect()
        };

        Self {
            pain_terms: compile_terms(&config.pain_terms),
            service_kinds: table(&config.service_kinds),
            seasonal_topics: table(&config.seasonal_topics),
            gap_reply_limit: config.gap_reply_limit,
            top_posts: config.top_posts,
            top_mentions: config.top_mentions,
            max_pain_points: config.max_pain_points,
            max_gaps_per_section: config.max_gaps_per_section,
        }
    }

    /// Analyzes posts in crawl order
    ///
    /// The result depends only on the posts, so the same export always
    /// yields the same insights.
    pub fn analyze(&self, posts: &[Post]) -> Insights {
        let texts: Vec<String> = posts.iter().map(Post::text).collect();

        let mut insights = Insights {
            categories: self.categories(posts),
            top_mentions: self.mentions(posts, &texts),
            service_kinds: self.service_kinds(posts, &texts),
            pain_points: self.pain_points(posts),
            resource_gaps: self.resource_gaps(posts),
            seasonal_topics: self.seasonal_topics(&texts),
            ..Insights::default()
        };

        for timestamp in posts.iter().filter_map(|p| p.timestamp) {
            insights.posts_by_month[timestamp.month0() as usize] += 1;
        }

        insights
    }

    fn categories(&self, posts: &[Post]) -> BTreeMap<OpportunityCategory, CategoryInsight> {
        let mut grouped: BTreeMap<OpportunityCategory, Vec<&Post>> = BTreeMap::new();
        for post in posts {
            if post.opportunity != OpportunityCategory::Uncategorized {
                grouped.entry(post.opportunity).or_default().push(post);
            }
        }

        grouped
            .into_iter()
            .map(|(category, members)| {
                let replies: u64 = members.iter().map(|p| p.replies_count).sum();
                let mut sections: BTreeMap<String, usize> = BTreeMap::new();
                for post in &members {
                    *sections.entry(post.section.name().to_string()).or_default() += 1;
                }

                let insight = CategoryInsight {
                    posts: members.len(),
                    average_replies: replies as f64 / members.len() as f64,
                    sections,
                    top_posts: self.highlights(members),
                };
                (category, insight)
            })
            .collect()
    }

    /// Highest engagement score first; replies break ties
    fn highlights(&self, mut posts: Vec<&Post>) -> Vec<PostHighlight> {
        posts.sort_by(|a, b| {
            b.engagement_score
                .total_cmp(&a.engagement_score)
                .then_with(|| b.replies_count.cmp(&a.replies_count))
        });

        posts
            .into_iter()
            .take(self.top_posts)
            .map(|post| PostHighlight {
                section: post.section.name().to_string(),
                post_id: post.post_id.clone(),
                title: post.title.clone(),
                preview: truncate(&post.content, PREVIEW_CHARS),
                replies: post.replies_count,
                views: post.views_count,
                engagement_score: post.engagement_score,
            })
            .collect()
    }

    /// Capitalized phrases in product posts, most frequent first
    fn mentions(&self, posts: &[Post], texts: &[String]) -> Vec<Mention> {
        let mut counts: HashMap<String, usize> = HashMap::new();

        for (post, text) in posts.iter().zip(texts) {
            if post.opportunity != OpportunityCategory::Product {
                continue;
            }
            for phrase in CAPITALIZED.find_iter(text) {
                if let Some(name) = strip_sentence_starters(phrase.as_str()) {
                    *counts.entry(name).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<Mention> = counts
            .into_iter()
            .map(|(name, count)| Mention { name, count })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        ranked.truncate(self.top_mentions);
        ranked
    }

    fn service_kinds(&self, posts: &[Post], texts: &[String]) -> BTreeMap<String, usize> {
        self.service_kinds
            .iter()
            .map(|(kind, terms)| {
                let count = posts
                    .iter()
                    .zip(texts)
                    .filter(|(post, _)| post.opportunity == OpportunityCategory::Service)
                    .filter(|(_, text)| terms.iter().any(|t| t.matches(text)))
                    .count();
                (kind.clone(), count)
            })
            .collect()
    }

    /// Sentences naming a struggle, most-replied posts first
    fn pain_points(&self, posts: &[Post]) -> Vec<PainPoint> {
        let mut points = Vec::new();

        for post in posts {
            let sentences = post
                .content
                .split(['.', '!', '?', '\n'])
                .map(str::trim)
                .filter(|s| s.chars().count() > MIN_PAIN_SENTENCE_CHARS)
                .filter(|s| self.pain_terms.iter().any(|t| t.matches(s)))
                .take(PAIN_SENTENCES_PER_POST);

            for sentence in sentences {
                points.push(PainPoint {
                    text: truncate(sentence, PREVIEW_CHARS),
                    section: post.section.name().to_string(),
                    replies: post.replies_count,
                });
            }
        }

        // Stable, so equally replied points keep crawl order
        points.sort_by(|a, b| b.replies.cmp(&a.replies));
        points.truncate(self.max_pain_points);
        points
    }

    /// Questions that drew few replies, by section
    fn resource_gaps(&self, posts: &[Post]) -> BTreeMap<String, Vec<String>> {
        let mut gaps: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for post in posts {
            if !post.is_question || post.replies_count > self.gap_reply_limit {
                continue;
            }
            let summary = if post.title.is_empty() {
                truncate(&post.content, GAP_CHARS)
            } else {
                post.title.clone()
            };
            if summary.is_empty() {
                continue;
            }

            let section = gaps.entry(post.section.name().to_string()).or_default();
            if section.len() < self.max_gaps_per_section {
                section.push(summary);
            }
        }

        gaps
    }

    fn seasonal_topics(&self, texts: &[String]) -> BTreeMap<String, Vec<TopicCount>> {
        self.seasonal_topics
            .iter()
            .map(|(season, terms)| {
                let topics = terms
                    .iter()
                    .filter_map(|term| {
                        let posts = texts.iter().filter(|text| term.matches(text)).count();
                        (posts > 0).then(|| TopicCount {
                            term: term.term.clone(),
                            posts,
                        })
                    })
                    .collect();
                (season.clone(), topics)
            })
            .collect()
    }
}

/// Drops leading sentence starters and stop words from a capitalized phrase
fn strip_sentence_starters(phrase: &str) -> Option<String> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    let start = words.iter().position(|word| {
        let lowered = word.to_lowercase();
        !SENTENCE_STARTERS.contains(&lowered.as_str()) && !STOP_WORDS.contains(&lowered.as_str())
    })?;
    Some(words[start..].join(" "))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
