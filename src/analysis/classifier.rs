//! Lexical post classifier
//!
//! Every decision here is a table lookup over configured term lists; adding a
//! category or a marker is a configuration change.

use crate::config::{ClassifierConfig, EngagementConfig};
use crate::post::{OpportunityCategory, Post};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeSet, HashMap};

/// Words too common to be useful as automatic keywords
pub(super) const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "could", "does", "doing",
    "from", "have", "having", "here", "just", "know", "like", "more", "much", "only", "other",
    "over", "really", "same", "should", "some", "still", "such", "than", "that", "their",
    "them", "then", "there", "these", "they", "this", "those", "very", "want", "were", "what",
    "when", "where", "which", "while", "will", "with", "would", "your", "anyone", "thanks",
];

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]{4,}").expect("valid word regex"));

/// A configured term and its case-insensitive word-start pattern
#[derive(Debug, Clone)]
pub(super) struct Term {
    pub(super) term: String,
    pattern: Regex,
}

impl Term {
    /// Terms starting with a word character must match at a word start;
    /// the end is open so `recommend` also matches `recommended`.
    fn compile(term: &str) -> Option<Self> {
        let trimmed = term.trim();
        let first = trimmed.chars().next()?;
        let prefix = if first.is_alphanumeric() || first == '_' {
            r"\b"
        } else {
            ""
        };

        let pattern = RegexBuilder::new(&format!("{}{}", prefix, regex::escape(trimmed)))
            .case_insensitive(true)
            .build()
            .map_err(|e| tracing::warn!("Skipping term {:?}: {}", trimmed, e))
            .ok()?;

        Some(Self {
            term: trimmed.to_string(),
            pattern,
        })
    }

    pub(super) fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

pub(super) fn compile_terms(terms: &[String]) -> Vec<Term> {
    terms.iter().filter_map(|t| Term::compile(t)).collect()
}

fn matched(terms: &[Term], text: &str) -> BTreeSet<String> {
    terms
        .iter()
        .filter(|t| t.matches(text))
        .map(|t| t.term.clone())
        .collect()
}

/// Annotates posts with question/answer flags, lexical hits, an opportunity
/// category and an engagement score
#[derive(Debug, Clone)]
pub struct Classifier {
    question_markers: Vec<Term>,
    answer_markers: Vec<Term>,
    sentiment_terms: Vec<Term>,
    resource_terms: Vec<Term>,
    keyword_terms: Vec<Term>,
    auto_keywords: usize,
    /// Evaluated in order; the first category with any hit wins
    opportunities: Vec<(OpportunityCategory, Vec<Term>)>,
    engagement: EngagementConfig,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let o = &config.opportunities;
        Self {
            question_markers: compile_terms(&config.question_markers),
            answer_markers: compile_terms(&config.answer_markers),
            sentiment_terms: compile_terms(&config.sentiment_terms),
            resource_terms: compile_terms(&config.resource_terms),
            keyword_terms: compile_terms(&config.keyword_terms),
            auto_keywords: config.auto_keywords,
            opportunities: vec![
                (OpportunityCategory::Product, compile_terms(&o.product)),
                (OpportunityCategory::Service, compile_terms(&o.service)),
                (OpportunityCategory::Information, compile_terms(&o.information)),
                (OpportunityCategory::Community, compile_terms(&o.community)),
            ],
            engagement: config.engagement.clone(),
        }
    }

    /// Classifies a post, replacing any earlier classification
    ///
    /// `is_question` and `is_answer` are independent: a structural reply that
    /// asks a follow-up question carries both flags.
    pub fn classify(&self, mut post: Post) -> Post {
        let text = post.text();

        post.is_question = text.contains('?') || self.question_markers.iter().any(|t| t.matches(&text));
        post.is_answer = post.reply_depth > 0 || self.answer_markers.iter().any(|t| t.matches(&text));

        post.sentiment_indicators = matched(&self.sentiment_terms, &text);
        post.resource_mentions = matched(&self.resource_terms, &text);

        let mut keywords = matched(&self.keyword_terms, &text);
        keywords.extend(top_words(&text, self.auto_keywords));
        post.keywords = keywords;

        post.opportunity = self.opportunity(&text);
        post.engagement_score =
            engagement_score(post.replies_count, post.views_count, &self.engagement);

        post
    }

    /// First category (in priority order) whose term set hits the text
    pub fn opportunity(&self, text: &str) -> OpportunityCategory {
        self.opportunities
            .iter()
            .find(|(_, terms)| terms.iter().any(|t| t.matches(text)))
            .map(|(category, _)| *category)
            .unwrap_or(OpportunityCategory::Uncategorized)
    }
}

/// Engagement score in `[0, 100]`
///
/// Zero without views. Otherwise a weighted sum of the reply-to-view ratio
/// and a log-scaled activity volume that saturates at `volume_saturation`.
/// Non-decreasing in `replies`.
pub fn engagement_score(replies: u64, views: u64, policy: &EngagementConfig) -> f64 {
    if views == 0 {
        return 0.0;
    }

    let ratio = (replies as f64 / views as f64).min(1.0);
    let activity = replies.saturating_add(views) as f64;
    let saturation = policy.volume_saturation.max(1) as f64;
    let volume = ((1.0 + activity).ln() / (1.0 + saturation).ln()).min(1.0);

    let score = policy.ratio_weight * ratio + policy.volume_weight * volume;
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// The `limit` most frequent non-stop-words of four or more letters
///
/// Ties are broken alphabetically so the result is deterministic.
fn top_words(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }

    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in WORD.find_iter(text) {
        let word = word.as_str().to_lowercase();
        if !STOP_WORDS.contains(&word.as_str()) {
            *counts.entry(word).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}
