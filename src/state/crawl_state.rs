/// Per-section crawl progress
///
/// This module defines why a section's crawl ended and the counters the
/// controller keeps while it runs.
use crate::post::Section;
use serde::Serialize;
use std::fmt;

/// Why a section's crawl stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    // ===== Normal Endings =====
    /// The configured page limit was reached
    MaxPages,

    /// A page yielded zero posts
    Exhausted,

    /// A page yielded fewer posts than the configured page size
    ShortPage,

    // ===== Abandoned =====
    /// The site refused the page (block page, 403, 404, ...)
    Blocked,

    /// robots.txt disallows the section
    PolicyViolation,

    /// Transient failures outlasted every retry
    FetchFailed,

    /// The session could not be re-established
    AuthFailure,

    // ===== Interrupted =====
    /// The run was cancelled or hit its time limit
    Cancelled,
}

impl TerminationReason {
    /// Returns true if the section was walked to a natural end
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::MaxPages | Self::Exhausted | Self::ShortPage)
    }

    /// Returns true if the section was given up because of an error
    pub fn is_abandoned(&self) -> bool {
        matches!(
            self,
            Self::Blocked | Self::PolicyViolation | Self::FetchFailed | Self::AuthFailure
        )
    }

    /// Returns the string representation used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxPages => "max_pages",
            Self::Exhausted => "exhausted",
            Self::ShortPage => "short_page",
            Self::Blocked => "blocked",
            Self::PolicyViolation => "policy_violation",
            Self::FetchFailed => "fetch_failed",
            Self::AuthFailure => "auth_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of one section's crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlState {
    pub section: Section,

    /// Page number that will be (or is being) fetched next, 1-based
    pub current_page: u32,

    /// Pages whose fetch returned a body
    pub pages_fetched: u32,

    /// Posts reported back by the caller
    pub posts_collected: usize,

    /// `None` while the crawl is still running
    pub termination: Option<TerminationReason>,

    /// Error message behind an abandoned section
    pub detail: Option<String>,
}

impl CrawlState {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            current_page: 1,
            pages_fetched: 0,
            posts_collected: 0,
            termination: None,
            detail: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.termination.is_none()
    }

    /// Sets the termination reason once; later calls are ignored
    pub fn finish(&mut self, reason: TerminationReason, detail: Option<String>) {
        if self.termination.is_none() {
            self.termination = Some(reason);
            self.detail = detail;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_classification() {
        assert!(TerminationReason::MaxPages.is_completed());
        assert!(TerminationReason::Exhausted.is_completed());
        assert!(!TerminationReason::Blocked.is_completed());

        assert!(TerminationReason::PolicyViolation.is_abandoned());
        assert!(TerminationReason::AuthFailure.is_abandoned());
        assert!(!TerminationReason::Cancelled.is_abandoned());
        assert!(!TerminationReason::Cancelled.is_completed());
    }

    #[test]
    fn test_display() {
        assert_eq!(TerminationReason::ShortPage.to_string(), "short_page");
        assert_eq!(TerminationReason::FetchFailed.to_string(), "fetch_failed");
    }

    #[test]
    fn test_finish_is_sticky() {
        let mut state = CrawlState::new(Section::new("general"));
        assert!(state.is_running());
        assert_eq!(state.current_page, 1);

        state.finish(TerminationReason::Blocked, Some("403".to_string()));
        state.finish(TerminationReason::MaxPages, None);

        assert_eq!(state.termination, Some(TerminationReason::Blocked));
        assert_eq!(state.detail.as_deref(), Some("403"));
    }
}
