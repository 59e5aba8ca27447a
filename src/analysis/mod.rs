//! Post analysis: classification, anonymization, aggregation and
//! business insights
//!
//! These stages are pure apart from the anonymizer's seen-username set and
//! never perform I/O.

mod aggregator;
mod anonymizer;
mod classifier;
mod insights;

pub use aggregator::{Aggregator, Stats, Summary, DEFAULT_HIGH_ENGAGEMENT_THRESHOLD};
pub use anonymizer::Anonymizer;
pub use classifier::{engagement_score, Classifier};
pub use insights::{
    CategoryInsight, InsightAnalyzer, Insights, Mention, PainPoint, PostHighlight, TopicCount,
};
