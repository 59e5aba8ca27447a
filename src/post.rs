//! Post records and the small value types they carry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A configured forum section
///
/// Obtained through [`Config::section`](crate::Config::section), never built
/// from arbitrary strings inside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Section(String);

impl Section {
    pub(crate) fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Business opportunity a post points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityCategory {
    Product,
    Service,
    Information,
    Community,
    Uncategorized,
}

impl OpportunityCategory {
    /// Every category, in classifier priority order
    pub const ALL: [OpportunityCategory; 5] = [
        Self::Product,
        Self::Service,
        Self::Information,
        Self::Community,
        Self::Uncategorized,
    ];

    /// Returns the string representation used in output files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Service => "service",
            Self::Information => "information",
            Self::Community => "community",
            Self::Uncategorized => "uncategorized",
        }
    }
}

impl Default for OpportunityCategory {
    fn default() -> Self {
        Self::Uncategorized
    }
}

impl fmt::Display for OpportunityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a link stays on the forum's host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Internal,
    External,
}

/// A hyperlink found in a post body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub text: String,
    pub link_type: LinkType,
}

/// One structured record extracted from a forum page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub section: Section,
    pub post_id: String,

    /// Raw username until anonymized, then an `anon_` token
    pub author: String,

    pub timestamp: Option<DateTime<Utc>>,
    pub title: String,
    pub content: String,
    pub replies_count: u64,
    pub views_count: u64,

    /// Structural nesting depth; 0 for a thread starter
    pub reply_depth: u32,

    pub tags: BTreeSet<String>,
    pub links: Vec<Link>,

    pub is_question: bool,
    pub is_answer: bool,
    pub sentiment_indicators: BTreeSet<String>,
    pub resource_mentions: BTreeSet<String>,
    pub keywords: BTreeSet<String>,
    pub opportunity: OpportunityCategory,
    pub engagement_score: f64,

    pub extracted_at: DateTime<Utc>,
}

impl Post {
    /// Creates an unclassified post with empty fields
    pub fn new(section: Section, post_id: impl Into<String>) -> Self {
        Self {
            section,
            post_id: post_id.into(),
            author: String::new(),
            timestamp: None,
            title: String::new(),
            content: String::new(),
            replies_count: 0,
            views_count: 0,
            reply_depth: 0,
            tags: BTreeSet::new(),
            links: Vec::new(),
            is_question: false,
            is_answer: false,
            sentiment_indicators: BTreeSet::new(),
            resource_mentions: BTreeSet::new(),
            keywords: BTreeSet::new(),
            opportunity: OpportunityCategory::Uncategorized,
            engagement_score: 0.0,
            extracted_at: Utc::now(),
        }
    }

    /// Title and content joined for lexical matching
    pub fn text(&self) -> String {
        if self.title.is_empty() {
            self.content.clone()
        } else {
            format!("{} {}", self.title, self.content)
        }
    }
}
