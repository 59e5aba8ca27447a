//! Page iteration within one forum section
//!
//! [`CrawlController`] is a synchronous state machine. The caller asks it for
//! the next page to fetch and reports back what happened; the controller
//! decides whether there is another page. It never performs I/O itself.

use crate::config::Config;
use crate::post::Section;
use crate::state::{CrawlState, TerminationReason};
use crate::ForumError;
use url::Url;

/// One page the caller should fetch next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub url: Url,
}

pub struct CrawlController {
    state: CrawlState,
    base_url: Url,
    template: String,
    max_pages: u32,
    page_size: Option<usize>,
    page_retries: u32,
    retries_used: u32,
}

/// Starts a crawl of `section` using the section's URL template
///
/// # Arguments
///
/// * `config` - Run configuration
/// * `section` - A configured section
/// * `max_pages` - Page limit for this crawl
pub fn crawl(config: &Config, section: Section, max_pages: u32) -> Result<CrawlController, ForumError> {
    let template = config
        .section_template(&section)
        .ok_or_else(|| ForumError::UnknownSection(section.name().to_string()))?
        .to_string();

    Ok(CrawlController::new(
        section,
        config.base_url()?,
        template,
        max_pages,
        config.crawler.page_size,
        config.crawler.page_retries,
    ))
}

impl CrawlController {
    pub fn new(
        section: Section,
        base_url: Url,
        template: String,
        max_pages: u32,
        page_size: Option<usize>,
        page_retries: u32,
    ) -> Self {
        Self {
            state: CrawlState::new(section),
            base_url,
            template,
            max_pages,
            page_size,
            page_retries,
            retries_used: 0,
        }
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn into_state(self) -> CrawlState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        !self.state.is_running()
    }

    /// Returns the next page to fetch, or `None` once the crawl is over
    pub fn next_page(&mut self) -> Option<PageRequest> {
        if self.is_done() {
            return None;
        }

        if self.state.current_page > self.max_pages {
            self.state.finish(TerminationReason::MaxPages, None);
            return None;
        }

        let page = self.state.current_page;
        match self.page_url(page) {
            Ok(url) => Some(PageRequest { page, url }),
            Err(e) => {
                self.state
                    .finish(TerminationReason::Blocked, Some(format!("bad page URL: {}", e)));
                None
            }
        }
    }

    /// Reports how many posts the current page produced
    ///
    /// Termination is checked in order: page limit, empty page, short page.
    pub fn record_page(&mut self, posts: usize) {
        self.state.pages_fetched += 1;
        self.state.posts_collected += posts;
        self.retries_used = 0;
        self.state.current_page += 1;

        if self.state.current_page > self.max_pages {
            self.state.finish(TerminationReason::MaxPages, None);
        } else if posts == 0 {
            self.state.finish(TerminationReason::Exhausted, None);
        } else if self.page_size.map_or(false, |size| posts < size) {
            self.state.finish(TerminationReason::ShortPage, None);
        }
    }

    /// Moves past a page whose body could not be parsed
    pub fn skip_page(&mut self) {
        self.state.pages_fetched += 1;
        self.retries_used = 0;
        self.state.current_page += 1;

        if self.state.current_page > self.max_pages {
            self.state.finish(TerminationReason::MaxPages, None);
        }
    }

    /// Reports a failed fetch of the current page
    ///
    /// `FetchFailed` re-requests the same page up to `page-retries` times;
    /// every other error abandons the section.
    pub fn record_error(&mut self, error: &ForumError) {
        let reason = match error {
            ForumError::FetchFailed { .. } if self.retries_used < self.page_retries => {
                self.retries_used += 1;
                tracing::info!(
                    "Retrying page {} of {} ({}/{})",
                    self.state.current_page,
                    self.state.section,
                    self.retries_used,
                    self.page_retries
                );
                return;
            }
            ForumError::FetchFailed { .. } => TerminationReason::FetchFailed,
            ForumError::PolicyViolation { .. } => TerminationReason::PolicyViolation,
            ForumError::AuthFailure { .. } => TerminationReason::AuthFailure,
            _ => TerminationReason::Blocked,
        };

        tracing::warn!(
            "Abandoning section {} at page {}: {}",
            self.state.section,
            self.state.current_page,
            error
        );
        self.state.finish(reason, Some(error.to_string()));
    }

    /// Stops the crawl between pages
    pub fn cancel(&mut self) {
        self.state.finish(TerminationReason::Cancelled, None);
    }

    /// Builds the URL of `page`
    ///
    /// A `{page}` placeholder in the template is substituted; otherwise page 1
    /// is the template itself and later pages get a `page=N` query parameter.
    pub fn page_url(&self, page: u32) -> Result<Url, url::ParseError> {
        if self.template.contains("{page}") {
            let path = self.template.replace("{page}", &page.to_string());
            return self.base_url.join(&path);
        }

        let mut url = self.base_url.join(&self.template)?;
        if page > 1 {
            url.query_pairs_mut().append_pair("page", &page.to_string());
        }
        Ok(url)
    }
}
